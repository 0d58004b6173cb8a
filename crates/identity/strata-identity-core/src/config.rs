//! Operator configuration for identity providers.

use crate::adapter::{AdapterPolicy, ProviderAdapter};
use crate::error::IdentityError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Configuration block for a single provider.
///
/// Deserialises from the raw operator block. Well-known keys are lifted into
/// typed fields; the whole block is also kept verbatim in `options` and handed
/// to the provider's callbacks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "Value")]
pub struct ProviderConfig {
    /// Use the generic OAuth2 adapter instead of the built-in one of the same name.
    pub oauth2: bool,
    pub app_ids: Option<Vec<String>>,
    pub policy: Option<String>,
    pub options: Value,
    /// Capability functions supplied by the operator.
    pub adapter: Option<ProviderAdapter>,
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self {
            options: Value::Object(Default::default()),
            ..Self::default()
        }
    }

    pub fn from_value(options: Value) -> Result<Self, IdentityError> {
        let object = match &options {
            Value::Object(object) => object,
            Value::Null => return Ok(Self::new()),
            other => {
                return Err(IdentityError::InvalidOptions(format!(
                    "provider configuration must be an object, got {other}"
                )));
            }
        };

        let oauth2 = object.get("oauth2").and_then(Value::as_bool).unwrap_or(false);
        let app_ids = match object.get("appIds") {
            None | Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value::<Vec<String>>(value.clone())?),
        };
        let policy = match object.get("policy") {
            None | Some(Value::Null) => None,
            Some(Value::String(policy)) => Some(policy.clone()),
            // Kept as text so the resolver reports it as a misconfigured policy.
            Some(other) => Some(other.to_string()),
        };

        Ok(Self {
            oauth2,
            app_ids,
            policy,
            options,
            adapter: None,
        })
    }

    pub fn with_adapter(mut self, adapter: ProviderAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_app_ids(mut self, app_ids: Vec<String>) -> Self {
        if let Value::Object(object) = &mut self.options {
            object.insert(
                "appIds".to_string(),
                Value::Array(app_ids.iter().cloned().map(Value::String).collect()),
            );
        }
        self.app_ids = Some(app_ids);
        self
    }

    /// The operator-side capability overrides: programmatic functions plus a
    /// `policy` read from the block.
    pub fn overrides(&self) -> ProviderAdapter {
        let mut overrides = self.adapter.clone().unwrap_or_default();
        if let Some(policy) = &self.policy {
            overrides.policy = Some(AdapterPolicy::Named(policy.clone()));
        }
        overrides
    }
}

impl TryFrom<Value> for ProviderConfig {
    type Error = IdentityError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// Provider name to operator configuration block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct AuthOptions(HashMap<String, ProviderConfig>);

impl AuthOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, name: impl Into<String>, config: ProviderConfig) -> Self {
        self.0.insert(name.into(), config);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}
