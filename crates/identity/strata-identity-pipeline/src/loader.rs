//! Builds the effective adapter for a provider from built-ins and operator configuration.

use crate::registry::{AdapterSource, ProviderRegistry};
use serde_json::Value;
use std::sync::Arc;
use strata_identity_core::{AuthOptions, IdentityResult, ProviderAdapter};
use tracing::debug;

/// A provider's merged adapter together with the configuration it runs with.
#[derive(Debug, Clone)]
pub struct LoadedAdapter {
    pub adapter: Arc<ProviderAdapter>,
    pub app_ids: Option<Vec<String>>,
    /// The operator block, or `null` when the provider is not configured.
    pub provider_options: Value,
}

/// Load the adapter for `provider`.
///
/// Returns `Ok(None)` when neither a built-in nor an operator block exists
/// for the name. A `validateOptions` failure is returned as an error.
pub fn load_auth_adapter(
    registry: &ProviderRegistry,
    provider: &str,
    auth_options: &AuthOptions,
) -> IdentityResult<Option<LoadedAdapter>> {
    let config = auth_options.get(provider);
    let Some(source) = registry.resolve(provider, config) else {
        return Ok(None);
    };

    let source_label = match &source {
        AdapterSource::BuiltIn(_) => "builtin",
        AdapterSource::GenericOAuth2(_) => "oauth2",
        AdapterSource::Operator => "operator",
    };
    let mut adapter = match source {
        AdapterSource::BuiltIn(adapter) | AdapterSource::GenericOAuth2(adapter) => adapter.clone(),
        AdapterSource::Operator => ProviderAdapter::new(),
    };
    if let Some(config) = config {
        adapter.overlay(&config.overrides());
    }
    adapter.normalize();

    let provider_options = config.map(|c| c.options.clone()).unwrap_or(Value::Null);
    if let Some(validate_options) = adapter.validate_options.get() {
        validate_options(&provider_options)?;
    }

    debug!(provider, source = source_label, "Loaded auth adapter");

    Ok(Some(LoadedAdapter {
        adapter: Arc::new(adapter),
        app_ids: config.and_then(|c| c.app_ids.clone()),
        provider_options,
    }))
}
