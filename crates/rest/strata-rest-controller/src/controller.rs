//! In-process request dispatch with batch transactions and network fallback.

use crate::config::ControllerConfig;
use crate::database::{Database, SessionId, TransactionalSession};
use crate::error::{ControllerError, ControllerResult};
use crate::network::NetworkClient;
use crate::request::{
    BatchItem, BatchOperation, BatchRequest, RequestInfo, RequestOptions, RoutedRequest,
};
use crate::router::Router;
use futures::future::{BoxFuture, join_all};
use http::Method;
use serde_json::Value;
use std::sync::Arc;
use strata_auth_core::{AuthContext, ErrorCode, PlatformError, SessionStore};
use tracing::{debug, info, warn};

/// Retries after the first attempt of a transactional batch.
pub const MAX_TRANSACTION_RETRIES: usize = 5;

/// Installation id used when the caller does not supply one.
pub const DEFAULT_INSTALLATION_ID: &str = "cloud";

pub const BATCH_PATH: &str = "/batch";

/// Routes server-side requests through the local route table, falling back
/// to the network when no local route exists.
pub struct RestController {
    config: Arc<ControllerConfig>,
    database: Arc<dyn Database>,
    sessions: Arc<dyn SessionStore>,
    router: Arc<dyn Router>,
    network: Arc<dyn NetworkClient>,
}

impl RestController {
    pub fn new(
        config: ControllerConfig,
        database: Arc<dyn Database>,
        sessions: Arc<dyn SessionStore>,
        router: Arc<dyn Router>,
        network: Arc<dyn NetworkClient>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            database,
            sessions,
            router,
            network,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Handle one request as if it had arrived over HTTP.
    ///
    /// `/batch` fans its sub-requests out concurrently and, when
    /// transactional, commits or aborts them together. A transactional batch
    /// that fails returns [`ControllerError::BatchAborted`] with every
    /// sub-result.
    pub async fn handle_request(
        &self,
        method: Method,
        path: &str,
        body: Value,
        options: RequestOptions,
    ) -> ControllerResult<Value> {
        self.dispatch(method, path.to_string(), body, options, None)
            .await
    }

    // Boxed so batch sub-requests can recurse.
    fn dispatch(
        &self,
        method: Method,
        path: String,
        body: Value,
        options: RequestOptions,
        transaction: Option<SessionId>,
    ) -> BoxFuture<'_, ControllerResult<Value>> {
        Box::pin(async move {
            let normalized = self.config.normalize_path(&path);
            if normalized == BATCH_PATH {
                // A nested batch opens a session only if its own body asks.
                return self.handle_batch(body, options).await;
            }
            self.route(method, path, normalized, body, options, transaction)
                .await
        })
    }

    async fn route(
        &self,
        method: Method,
        path: String,
        normalized: String,
        body: Value,
        options: RequestOptions,
        transaction: Option<SessionId>,
    ) -> ControllerResult<Value> {
        let auth = self.resolve_auth(&options).await?;
        let request = RoutedRequest {
            body: body.clone(),
            config: self.config.clone(),
            auth,
            info: RequestInfo {
                application_id: self.config.application_id.clone(),
                session_token: options.session_token.clone(),
                installation_id: options.installation_id.clone(),
                context: options.context.clone(),
            },
            query: (method == Method::GET).then(|| body.clone()),
            transaction,
        };

        debug!("Routing {} {}", method, normalized);
        match self.router.try_route_request(&method, &normalized, request).await {
            Ok(response) => Ok(response.into_envelope(options.return_status)),
            Err(err) if err.is_cannot_route(method.as_str(), &normalized) => {
                info!("No local route for {} {}, sending over the network", method, normalized);
                self.network.request(&method, &path, body, &options).await
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Master key wins, then the session token, then anonymous.
    async fn resolve_auth(&self, options: &RequestOptions) -> ControllerResult<AuthContext> {
        let installation_id = options
            .installation_id
            .as_deref()
            .unwrap_or(DEFAULT_INSTALLATION_ID);

        let auth = if options.use_master_key {
            AuthContext::master().with_installation_id(installation_id)
        } else if let Some(token) = &options.session_token {
            self.sessions
                .auth_for_session_token(token, installation_id)
                .await?
        } else {
            AuthContext::anonymous().with_installation_id(installation_id)
        };
        Ok(auth.with_context(options.context.clone()))
    }

    async fn handle_batch(&self, body: Value, options: RequestOptions) -> ControllerResult<Value> {
        let batch: BatchRequest = serde_json::from_value(body).map_err(|e| {
            PlatformError::new(ErrorCode::INVALID_JSON, format!("Invalid batch request: {e}"))
        })?;
        let transactional = options.transaction || batch.transaction;

        let mut retries_left = MAX_TRANSACTION_RETRIES;
        loop {
            match self.run_batch(&batch, &options, transactional).await {
                Ok(items) => return Ok(serde_json::to_value(items)?),
                Err(ControllerError::BatchAborted(items))
                    if retries_left > 0 && items.iter().any(is_transaction_conflict) =>
                {
                    retries_left -= 1;
                    warn!(
                        "Batch transaction conflicted, retrying ({} retries left)",
                        retries_left
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One attempt: a fresh session, every sub-request, then commit or abort.
    async fn run_batch(
        &self,
        batch: &BatchRequest,
        options: &RequestOptions,
        transactional: bool,
    ) -> ControllerResult<Vec<BatchItem>> {
        let session = if transactional {
            Some(self.database.create_transactional_session().await?)
        } else {
            None
        };
        let session_id = session.as_ref().map(TransactionalSession::id);

        let items = join_all(
            batch
                .requests
                .iter()
                .map(|operation| self.run_operation(operation, options, session_id)),
        )
        .await;

        let Some(session) = session else {
            return Ok(items);
        };
        let id = session.id();
        if items.iter().any(BatchItem::is_error) {
            self.database.abort_transactional_session(session).await?;
            debug!("Aborted batch transaction {}", id);
            return Err(ControllerError::BatchAborted(items));
        }
        self.database.commit_transactional_session(session).await?;
        debug!("Committed batch transaction {}", id);
        Ok(items)
    }

    async fn run_operation(
        &self,
        operation: &BatchOperation,
        options: &RequestOptions,
        transaction: Option<SessionId>,
    ) -> BatchItem {
        let Ok(method) = Method::from_bytes(operation.method.to_ascii_uppercase().as_bytes()) else {
            return BatchItem::error(PlatformError::new(
                ErrorCode::INVALID_JSON,
                format!("Invalid batch method {}", operation.method),
            ));
        };

        // The batch-level transaction flag applies to this batch only.
        let sub_options = RequestOptions {
            transaction: false,
            ..options.clone()
        };
        match self
            .dispatch(
                method,
                operation.path.clone(),
                operation.body.clone(),
                sub_options,
                transaction,
            )
            .await
        {
            Ok(response) => BatchItem::from_response(response, options.return_status),
            Err(err) => BatchItem::error(err.into_platform_error()),
        }
    }
}

fn is_transaction_conflict(item: &BatchItem) -> bool {
    item.error_code() == Some(ErrorCode::TRANSACTION_CONFLICT)
}
