//! Request and response shapes for in-process dispatch.

use crate::config::ControllerConfig;
use crate::database::SessionId;
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use strata_auth_core::{AuthContext, ErrorCode, PlatformError};

/// Per-call options supplied by server-side code.
#[derive(Debug, Clone, Default, Builder)]
pub struct RequestOptions {
    /// Run with master privileges; skips session lookup.
    #[builder(default)]
    pub use_master_key: bool,

    #[builder(into)]
    pub session_token: Option<String>,

    #[builder(into)]
    pub installation_id: Option<String>,

    #[builder(default)]
    pub context: Map<String, Value>,

    /// Wrap a `/batch` call in a single storage transaction.
    #[builder(default)]
    pub transaction: bool,

    /// Hoist the route's status and headers into the response as `_status`
    /// and `_headers`.
    #[builder(default)]
    pub return_status: bool,
}

/// Client metadata attached to a routed request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    pub application_id: String,
    pub session_token: Option<String>,
    pub installation_id: Option<String>,
    pub context: Map<String, Value>,
}

/// What a route handler receives.
#[derive(Debug, Clone)]
pub struct RoutedRequest {
    pub body: Value,
    pub config: Arc<ControllerConfig>,
    pub auth: AuthContext,
    pub info: RequestInfo,
    /// Only set for `GET`, taken verbatim from the request data.
    pub query: Option<Value>,
    /// The batch transaction this request runs inside, if any.
    pub transaction: Option<SessionId>,
}

/// What a route handler returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteResponse {
    pub response: Value,
    pub status: Option<u16>,
    pub headers: HashMap<String, String>,
}

impl RouteResponse {
    pub fn ok(response: Value) -> Self {
        Self {
            response,
            status: Some(200),
            headers: HashMap::new(),
        }
    }

    pub fn created(response: Value) -> Self {
        Self {
            response,
            status: Some(201),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The response body, with `_status` and `_headers` added when requested.
    pub fn into_envelope(self, return_status: bool) -> Value {
        if !return_status {
            return self.response;
        }
        let headers: Map<String, Value> = self
            .headers
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        attach_status(self.response, self.status, headers)
    }
}

pub(crate) fn attach_status(response: Value, status: Option<u16>, headers: Map<String, Value>) -> Value {
    match response {
        Value::Object(mut object) => {
            object.insert(
                "_status".to_string(),
                status.map(Value::from).unwrap_or(Value::Null),
            );
            object.insert("_headers".to_string(), Value::Object(headers));
            Value::Object(object)
        }
        other => other,
    }
}

/// Body of a `/batch` call.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<BatchOperation>,
    #[serde(default)]
    pub transaction: bool,
}

/// One sub-request of a batch.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchOperation {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub body: Value,
}

/// Outcome of one batch sub-request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItem {
    Success {
        success: Value,
        #[serde(rename = "_status", default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(rename = "_headers", default, skip_serializing_if = "Option::is_none")]
        headers: Option<Map<String, Value>>,
    },
    Error {
        error: PlatformError,
    },
}

impl BatchItem {
    pub fn success(value: Value) -> Self {
        BatchItem::Success {
            success: value,
            status: None,
            headers: None,
        }
    }

    pub fn error(error: PlatformError) -> Self {
        BatchItem::Error { error }
    }

    /// Build a success item from a sub-response, moving `_status` and
    /// `_headers` out of the payload when `return_status` is set.
    pub fn from_response(response: Value, return_status: bool) -> Self {
        let Value::Object(mut object) = response else {
            return Self::success(response);
        };
        if !return_status {
            return Self::success(Value::Object(object));
        }
        let status = object
            .remove("_status")
            .and_then(|s| s.as_u64())
            .and_then(|s| u16::try_from(s).ok());
        let headers = match object.remove("_headers") {
            Some(Value::Object(headers)) => Some(headers),
            _ => None,
        };
        BatchItem::Success {
            success: Value::Object(object),
            status,
            headers,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, BatchItem::Error { .. })
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            BatchItem::Error { error } => Some(error.code),
            BatchItem::Success { .. } => None,
        }
    }
}
