//! Local route table consulted before the network.

use crate::request::{RouteResponse, RoutedRequest};
use async_trait::async_trait;
use http::Method;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use strata_auth_core::PlatformError;
use tracing::debug;

/// Routes a request to an in-process handler.
///
/// A miss must be reported as [`PlatformError::cannot_route`] for exactly the
/// method and path that were asked for; any other error is a handler failure.
#[async_trait]
pub trait Router: Send + Sync {
    async fn try_route_request(
        &self,
        method: &Method,
        path: &str,
        request: RoutedRequest,
    ) -> Result<RouteResponse, PlatformError>;
}

pub type RouteFuture =
    Pin<Box<dyn Future<Output = Result<RouteResponse, PlatformError>> + Send + 'static>>;

/// Boxed route handler.
pub type RouteHandler = Box<dyn Fn(RoutedRequest) -> RouteFuture + Send + Sync>;

/// Exact-match route table.
#[derive(Default)]
pub struct RouteTable {
    handlers: HashMap<(Method, String), RouteHandler>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, method: Method, path: &str, handler: F)
    where
        F: Fn(RoutedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RouteResponse, PlatformError>> + Send + 'static,
    {
        debug!("Registering route {} {}", method, path);
        let boxed_handler: RouteHandler =
            Box::new(move |request| Box::pin(handler(request)) as RouteFuture);
        self.handlers.insert((method, path.to_string()), boxed_handler);
    }

    pub fn route<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(RoutedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RouteResponse, PlatformError>> + Send + 'static,
    {
        self.register(method, path, handler);
        self
    }

    pub fn has_route(&self, method: &Method, path: &str) -> bool {
        self.handlers.contains_key(&(method.clone(), path.to_string()))
    }
}

#[async_trait]
impl Router for RouteTable {
    async fn try_route_request(
        &self,
        method: &Method,
        path: &str,
        request: RoutedRequest,
    ) -> Result<RouteResponse, PlatformError> {
        let Some(handler) = self.handlers.get(&(method.clone(), path.to_string())) else {
            return Err(PlatformError::cannot_route(method.as_str(), path));
        };
        handler(request).await
    }
}
