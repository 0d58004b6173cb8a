//! Request-scoped authentication state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-principal map of provider name to the provider's opaque credential blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthDataBundle(BTreeMap<String, serde_json::Value>);

impl AuthDataBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl Into<String>, data: serde_json::Value) -> Self {
        self.insert(provider, data);
        self
    }

    pub fn insert(&mut self, provider: impl Into<String>, data: serde_json::Value) {
        self.0.insert(provider.into(), data);
    }

    pub fn get(&self, provider: &str) -> Option<&serde_json::Value> {
        self.0.get(provider)
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A provider counts as configured when its entry is present and
    /// [linked](Self::is_linked).
    pub fn is_configured(&self, provider: &str) -> bool {
        self.0.get(provider).is_some_and(Self::is_linked)
    }

    /// Whether a provider entry holds credentials.
    ///
    /// `null`, `false` and the empty string are the values left behind when a
    /// provider is unlinked.
    pub fn is_linked(value: &serde_json::Value) -> bool {
        match value {
            serde_json::Value::Null | serde_json::Value::Bool(false) => false,
            serde_json::Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

impl FromIterator<(String, serde_json::Value)> for AuthDataBundle {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An end-user account a request may act as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default, rename = "authData")]
    pub auth_data: AuthDataBundle,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            auth_data: AuthDataBundle::new(),
        }
    }

    pub fn with_auth_data(mut self, auth_data: AuthDataBundle) -> Self {
        self.auth_data = auth_data;
        self
    }
}

/// Authentication state of a single inbound request.
///
/// Built once per request and handed to validators by reference.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub user: Option<Principal>,
    pub is_master: bool,
    pub ip: Option<String>,
    pub installation_id: Option<String>,
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl AuthContext {
    /// An unauthenticated request.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A request authenticated with the master key.
    pub fn master() -> Self {
        Self {
            is_master: true,
            ..Self::default()
        }
    }

    /// A request authenticated as `user` through a session.
    pub fn for_user(user: Principal) -> Self {
        Self {
            user: Some(user),
            ..Self::default()
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_installation_id(mut self, installation_id: impl Into<String>) -> Self {
        self.installation_id = Some(installation_id.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Map<String, serde_json::Value>) -> Self {
        self.context = context;
        self
    }

    /// Whether the request may act as `principal`: either it is authenticated
    /// as that same principal, or it carries the master key.
    pub fn acts_as(&self, principal: Option<&Principal>) -> bool {
        let Some(principal) = principal else {
            return false;
        };
        self.is_master || self.user.as_ref().is_some_and(|u| u.id == principal.id)
    }

    /// The view of this request handed to provider callbacks.
    pub fn provider_request(&self) -> ProviderRequest {
        ProviderRequest {
            ip: self.ip.clone(),
            user: self.user.clone(),
            master: self.is_master,
            installation_id: self.installation_id.clone(),
        }
    }
}

/// What a provider callback gets to know about the calling request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub ip: Option<String>,
    pub user: Option<Principal>,
    pub master: bool,
    #[serde(rename = "installationId")]
    pub installation_id: Option<String>,
}
