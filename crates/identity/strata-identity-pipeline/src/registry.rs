//! Two-tier provider lookup: built-in adapters first, operator configuration second.

use crate::providers;
use std::collections::HashMap;
use strata_identity_core::{ProviderAdapter, ProviderConfig};

/// Where a provider's base adapter comes from.
#[derive(Debug)]
pub enum AdapterSource<'a> {
    /// The built-in adapter registered under the provider's name.
    BuiltIn(&'a ProviderAdapter),
    /// The protocol-generic OAuth2 adapter, selected by `oauth2: true`.
    GenericOAuth2(&'a ProviderAdapter),
    /// No built-in; everything comes from the operator configuration.
    Operator,
}

/// Immutable set of built-in provider adapters.
pub struct ProviderRegistry {
    builtins: HashMap<String, ProviderAdapter>,
    oauth2: ProviderAdapter,
}

impl ProviderRegistry {
    /// A registry with no built-in providers besides the generic OAuth2 adapter.
    pub fn empty() -> Self {
        Self {
            builtins: HashMap::new(),
            oauth2: providers::oauth2::OAuth2IntrospectionProvider::new().into_adapter(),
        }
    }

    /// The providers every server ships with.
    pub fn with_builtins() -> Self {
        Self::empty().register(providers::anonymous::PROVIDER_ID, providers::anonymous::adapter())
    }

    pub fn register(mut self, name: impl Into<String>, adapter: ProviderAdapter) -> Self {
        self.builtins.insert(name.into(), adapter);
        self
    }

    pub fn builtin(&self, name: &str) -> Option<&ProviderAdapter> {
        self.builtins.get(name)
    }

    /// Resolve `name` against the built-ins and the operator's block for it.
    ///
    /// `None` means the name is not a provider at all.
    pub fn resolve<'a>(
        &'a self,
        name: &str,
        config: Option<&ProviderConfig>,
    ) -> Option<AdapterSource<'a>> {
        if config.is_some_and(|config| config.oauth2) {
            return Some(AdapterSource::GenericOAuth2(&self.oauth2));
        }
        if let Some(adapter) = self.builtins.get(name) {
            return Some(AdapterSource::BuiltIn(adapter));
        }
        config.map(|_| AdapterSource::Operator)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
