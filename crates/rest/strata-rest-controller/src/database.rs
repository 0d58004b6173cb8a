//! Storage collaborator for transactional batches.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use strata_auth_core::PlatformError;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Handle identifying a transactional session to route handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An open storage transaction. Owned by exactly one batch attempt and
/// consumed by commit or abort.
#[derive(Debug)]
pub struct TransactionalSession {
    id: SessionId,
}

impl TransactionalSession {
    pub fn new() -> Self {
        Self {
            id: SessionId(Uuid::new_v4()),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Default for TransactionalSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
pub trait Database: Send + Sync {
    async fn create_transactional_session(&self) -> Result<TransactionalSession, PlatformError>;

    async fn commit_transactional_session(
        &self,
        session: TransactionalSession,
    ) -> Result<(), PlatformError>;

    async fn abort_transactional_session(
        &self,
        session: TransactionalSession,
    ) -> Result<(), PlatformError>;
}

/// Counts of session operations seen by an [`InMemoryDatabase`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub created: usize,
    pub committed: usize,
    pub aborted: usize,
}

/// In-memory [`Database`] that tracks open sessions.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    open: Arc<RwLock<HashSet<SessionId>>>,
    stats: Arc<RwLock<SessionStats>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stats(&self) -> SessionStats {
        *self.stats.read().await
    }

    pub async fn open_sessions(&self) -> usize {
        self.open.read().await.len()
    }

    async fn close(&self, session: TransactionalSession) -> Result<(), PlatformError> {
        if self.open.write().await.remove(&session.id()) {
            Ok(())
        } else {
            Err(PlatformError::other_cause(format!(
                "Transactional session {} is not open",
                session.id()
            )))
        }
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    async fn create_transactional_session(&self) -> Result<TransactionalSession, PlatformError> {
        let session = TransactionalSession::new();
        self.open.write().await.insert(session.id());
        self.stats.write().await.created += 1;
        Ok(session)
    }

    async fn commit_transactional_session(
        &self,
        session: TransactionalSession,
    ) -> Result<(), PlatformError> {
        self.close(session).await?;
        self.stats.write().await.committed += 1;
        Ok(())
    }

    async fn abort_transactional_session(
        &self,
        session: TransactionalSession,
    ) -> Result<(), PlatformError> {
        self.close(session).await?;
        self.stats.write().await.aborted += 1;
        Ok(())
    }
}
