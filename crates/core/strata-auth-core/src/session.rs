//! Session token resolution.

use crate::context::{AuthContext, Principal};
use crate::error::PlatformError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// A stored login session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token: String,
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(principal: Principal, ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            token: format!("r:{}", Uuid::new_v4().simple()),
            principal,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Resolves session tokens into authenticated request contexts.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up `token`. Unknown or expired tokens fail with
    /// `INVALID_SESSION_TOKEN`.
    async fn auth_for_session_token(
        &self,
        token: &str,
        installation_id: &str,
    ) -> Result<AuthContext, PlatformError>;
}

/// In-memory implementation of [`SessionStore`].
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::days(365),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Open a session for `principal` and return its token.
    pub async fn begin_session(&self, principal: Principal) -> String {
        let record = SessionRecord::new(principal, self.ttl);
        let token = record.token.clone();
        self.sessions.write().await.insert(token.clone(), record);
        token
    }

    pub async fn end_session(&self, token: &str) -> Option<SessionRecord> {
        self.sessions.write().await.remove(token)
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn auth_for_session_token(
        &self,
        token: &str,
        installation_id: &str,
    ) -> Result<AuthContext, PlatformError> {
        let mut sessions = self.sessions.write().await;
        if sessions.get(token).is_some_and(SessionRecord::is_expired) {
            debug!("Evicting expired session");
            sessions.remove(token);
        }
        let record = sessions
            .get(token)
            .ok_or_else(PlatformError::invalid_session_token)?;

        Ok(AuthContext::for_user(record.principal.clone()).with_installation_id(installation_id))
    }
}
