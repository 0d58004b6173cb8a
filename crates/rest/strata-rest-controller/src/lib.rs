//! In-process REST dispatch for server-side code.
//!
//! [`RestController`] lets server code issue REST calls without leaving the
//! process. Requests are matched against a local [`Router`]; when nothing
//! matches, the same call goes out through a [`NetworkClient`] instead.
//!
//! `/batch` requests run their sub-requests concurrently. With
//! `transaction: true` they share one [`TransactionalSession`] that is
//! committed only if every sub-request succeeds; storage conflicts
//! ([`ErrorCode::TRANSACTION_CONFLICT`]) retry the whole batch on a fresh
//! session up to [`MAX_TRANSACTION_RETRIES`] times.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use http::Method;
//! use serde_json::json;
//! use strata_auth_core::InMemorySessionStore;
//! use strata_rest_controller::{
//!     ControllerConfig, HttpNetworkClient, InMemoryDatabase, RequestOptions, RestController,
//!     RouteResponse, RouteTable,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControllerConfig::new("my-app", "https://api.example.com/parse".parse()?)
//!     .with_master_key("secret");
//! let routes = RouteTable::new().route(Method::GET, "/health", |_| async move {
//!     Ok(RouteResponse::ok(json!({ "status": "ok" })))
//! });
//!
//! let controller = RestController::new(
//!     config.clone(),
//!     Arc::new(InMemoryDatabase::new()),
//!     Arc::new(InMemorySessionStore::new()),
//!     Arc::new(routes),
//!     Arc::new(HttpNetworkClient::new(&config)?),
//! );
//!
//! let health = controller
//!     .handle_request(Method::GET, "/parse/health", json!({}), RequestOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`ErrorCode::TRANSACTION_CONFLICT`]: strata_auth_core::ErrorCode::TRANSACTION_CONFLICT

mod config;
mod controller;
mod database;
mod error;
mod network;
mod request;
mod router;

pub use config::ControllerConfig;
pub use controller::{BATCH_PATH, DEFAULT_INSTALLATION_ID, MAX_TRANSACTION_RETRIES, RestController};
pub use database::{Database, InMemoryDatabase, SessionId, SessionStats, TransactionalSession};
pub use error::{ControllerError, ControllerResult};
pub use network::{
    APPLICATION_ID_HEADER, AjaxResponse, HttpNetworkClient, INSTALLATION_ID_HEADER,
    MASTER_KEY_HEADER, NetworkClient, SESSION_TOKEN_HEADER,
};
pub use request::{
    BatchItem, BatchOperation, BatchRequest, RequestInfo, RequestOptions, RouteResponse,
    RoutedRequest,
};
pub use router::{RouteFuture, RouteHandler, RouteTable, Router};

pub use http::Method;
