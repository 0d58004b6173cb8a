//! Network fallback used when no local route matches.

use crate::config::ControllerConfig;
use crate::error::{ControllerError, ControllerResult};
use crate::request::RequestOptions;
use async_trait::async_trait;
use http::Method;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use strata_auth_core::{ErrorCode, PlatformError};
use tracing::{debug, error};
use url::Url;

pub const APPLICATION_ID_HEADER: &str = "X-Application-Id";
pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";
pub const MASTER_KEY_HEADER: &str = "X-Master-Key";
pub const INSTALLATION_ID_HEADER: &str = "X-Installation-Id";

/// Issues a request against the real server. Takes the same arguments as
/// [`RestController::handle_request`](crate::RestController::handle_request).
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn request(
        &self,
        method: &Method,
        path: &str,
        body: Value,
        options: &RequestOptions,
    ) -> ControllerResult<Value>;
}

/// Raw HTTP result returned by [`HttpNetworkClient::ajax`].
#[derive(Debug, Clone, PartialEq)]
pub struct AjaxResponse {
    pub response: Value,
    pub status: u16,
    pub headers: HashMap<String, String>,
}

/// reqwest-backed [`NetworkClient`].
#[derive(Clone)]
pub struct HttpNetworkClient {
    http_client: Client,
    config: ControllerConfig,
}

impl HttpNetworkClient {
    pub fn new(config: &ControllerConfig) -> ControllerResult<Self> {
        Self::with_timeout(config, Duration::from_secs(30))
    }

    pub fn with_timeout(config: &ControllerConfig, timeout: Duration) -> ControllerResult<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            config: config.clone(),
        })
    }

    /// Resolve `path` against the server URL, keeping the server's own path.
    ///
    /// `path` may carry the mount prefix or not; both resolve to the same URL.
    pub fn endpoint(&self, path: &str) -> ControllerResult<Url> {
        let mut base = self.config.server_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        let relative = self.config.normalize_path(path);
        base.join(relative.trim_start_matches('/')).map_err(|e| {
            ControllerError::Platform(PlatformError::new(
                ErrorCode::INVALID_JSON,
                format!("Invalid request path {path}: {e}"),
            ))
        })
    }

    /// Perform one HTTP request and decode its JSON body.
    ///
    /// Non-2xx responses become a [`PlatformError`] via [`Self::handle_error`].
    pub async fn ajax(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        headers: HashMap<String, String>,
    ) -> ControllerResult<AjaxResponse> {
        let mut request = self.http_client.request(method.clone(), url.clone());
        for (name, value) in &headers {
            request = request.header(name, value);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let response_headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let text = response.text().await?;

        if !(200..300).contains(&status) {
            error!("{} {} failed with status {}", method, url, status);
            return Err(Self::handle_error(status, &text).into());
        }

        let response = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        debug!("{} {} succeeded with status {}", method, url, status);
        Ok(AjaxResponse {
            response,
            status,
            headers: response_headers,
        })
    }

    /// Convert a failed HTTP response into the error the server reported.
    pub fn handle_error(status: u16, body: &str) -> PlatformError {
        if body.trim().is_empty() {
            return PlatformError::new(
                ErrorCode::CONNECTION_FAILED,
                format!("Request failed with status {status}"),
            );
        }
        match serde_json::from_str::<PlatformError>(body) {
            Ok(err) => err,
            Err(_) => PlatformError::new(
                ErrorCode::INVALID_JSON,
                format!("Received an error with invalid JSON from the server: {body}"),
            ),
        }
    }

    fn headers_for(&self, options: &RequestOptions) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(APPLICATION_ID_HEADER.to_string(), self.config.application_id.clone());
        if options.use_master_key {
            if let Some(master_key) = &self.config.master_key {
                headers.insert(MASTER_KEY_HEADER.to_string(), master_key.clone());
            }
        }
        if let Some(token) = &options.session_token {
            headers.insert(SESSION_TOKEN_HEADER.to_string(), token.clone());
        }
        if let Some(installation_id) = &options.installation_id {
            headers.insert(INSTALLATION_ID_HEADER.to_string(), installation_id.clone());
        }
        headers
    }
}

/// Reads go out as query parameters; strings are sent bare, everything else
/// JSON-encoded.
fn query_pairs(body: &Value) -> Vec<(String, String)> {
    let Value::Object(fields) = body else {
        return Vec::new();
    };
    fields
        .iter()
        .map(|(key, value)| {
            let encoded = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), encoded)
        })
        .collect()
}

#[async_trait]
impl NetworkClient for HttpNetworkClient {
    async fn request(
        &self,
        method: &Method,
        path: &str,
        body: Value,
        options: &RequestOptions,
    ) -> ControllerResult<Value> {
        let mut url = self.endpoint(path)?;
        let headers = self.headers_for(options);

        let payload = if *method == Method::GET {
            let pairs = query_pairs(&body);
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
            None
        } else {
            Some(body)
        };

        let response = self.ajax(method.clone(), url, payload, headers).await?;
        Ok(response.response)
    }
}
