//! Provider adapters as explicit capability sets.
//!
//! Every capability an adapter can offer lives in its own [`Capability`] slot.
//! A slot is either unset, inherited from the default (no-op) adapter, or
//! provided by a real implementation. Inherited slots exist so that adapters
//! built on top of [`ProviderAdapter::base`] can be told apart from adapters
//! that actually implement a capability.

use crate::error::IdentityResult;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use strata_auth_core::ProviderRequest;

/// Boxed future returned by provider callbacks.
pub type ProviderFuture<T> = Pin<Box<dyn Future<Output = IdentityResult<T>> + Send + 'static>>;

/// `(authData, providerOptions, request)`, shared by `validateAuthData` and the
/// three lifecycle methods.
pub type AuthDataFn = Arc<dyn Fn(Value, Value, ProviderRequest) -> ProviderFuture<Value> + Send + Sync>;

/// `(appIds, authData, providerOptions, request)`
pub type AppIdFn =
    Arc<dyn Fn(Vec<String>, Value, Value, ProviderRequest) -> ProviderFuture<()> + Send + Sync>;

/// `(challengeData, authData, providerOptions, request)`
pub type ChallengeFn =
    Arc<dyn Fn(Value, Value, Value, ProviderRequest) -> ProviderFuture<Value> + Send + Sync>;

/// Runs once at load time against the operator configuration block.
pub type OptionsFn = Arc<dyn Fn(&Value) -> IdentityResult<()> + Send + Sync>;

/// `(storedAuthData, providerOptions, request)`; `Some` replaces the stored blob.
pub type AfterFindFn =
    Arc<dyn Fn(Value, Value, ProviderRequest) -> ProviderFuture<Option<Value>> + Send + Sync>;

/// Decides from the incoming auth data whether the provider applies.
pub type PolicyFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// One capability slot of an adapter.
#[derive(Clone, Default)]
pub enum Capability<F> {
    #[default]
    Unset,
    /// Left at the default adapter's no-op.
    Inherited,
    Provided(F),
}

impl<F> Capability<F> {
    pub fn get(&self) -> Option<&F> {
        match self {
            Capability::Provided(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_provided(&self) -> bool {
        matches!(self, Capability::Provided(_))
    }

    /// Inherited no-ops count as "not provided".
    fn normalize(&mut self) {
        if matches!(self, Capability::Inherited) {
            *self = Capability::Unset;
        }
    }
}

impl<F: Clone> Capability<F> {
    /// Take `other`'s slot when it carries something. A provided implementation
    /// is never replaced by an inherited stub.
    fn overlay(&mut self, other: &Capability<F>) {
        match other {
            Capability::Provided(f) => *self = Capability::Provided(f.clone()),
            Capability::Inherited if !self.is_provided() => *self = Capability::Inherited,
            _ => {}
        }
    }
}

impl<F> fmt::Debug for Capability<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Unset => write!(f, "Unset"),
            Capability::Inherited => write!(f, "Inherited"),
            Capability::Provided(_) => write!(f, "Provided"),
        }
    }
}

/// The enumerated policy values an adapter may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    Default,
    Solo,
    Additional,
}

impl FromStr for AuthPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(AuthPolicy::Default),
            "solo" => Ok(AuthPolicy::Solo),
            "additional" => Ok(AuthPolicy::Additional),
            _ => Err(()),
        }
    }
}

/// An adapter's declared policy, as configured. Named policies are kept as
/// written and checked when the adapter is used.
#[derive(Clone)]
pub enum AdapterPolicy {
    Named(String),
    Predicate(PolicyFn),
}

impl AdapterPolicy {
    pub fn is_valid(&self) -> bool {
        match self {
            AdapterPolicy::Named(name) => name.parse::<AuthPolicy>().is_ok(),
            AdapterPolicy::Predicate(_) => true,
        }
    }
}

impl fmt::Debug for AdapterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterPolicy::Named(name) => write!(f, "Named({name:?})"),
            AdapterPolicy::Predicate(_) => write!(f, "Predicate"),
        }
    }
}

/// The lifecycle methods a multi-method adapter must implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleMethod {
    ValidateSetUp,
    ValidateLogin,
    ValidateUpdate,
}

impl LifecycleMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleMethod::ValidateSetUp => "validateSetUp",
            LifecycleMethod::ValidateLogin => "validateLogin",
            LifecycleMethod::ValidateUpdate => "validateUpdate",
        }
    }
}

impl fmt::Display for LifecycleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn boxed_auth_data_fn<F, Fut>(f: F) -> AuthDataFn
where
    F: Fn(Value, Value, ProviderRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = IdentityResult<Value>> + Send + 'static,
{
    Arc::new(move |auth_data, options, request| {
        Box::pin(f(auth_data, options, request)) as ProviderFuture<Value>
    })
}

/// A credential provider, described by the capabilities it offers.
#[derive(Clone, Default, Debug)]
pub struct ProviderAdapter {
    pub validate_auth_data: Capability<AuthDataFn>,
    pub validate_app_id: Capability<AppIdFn>,
    pub validate_set_up: Capability<AuthDataFn>,
    pub validate_login: Capability<AuthDataFn>,
    pub validate_update: Capability<AuthDataFn>,
    pub challenge: Capability<ChallengeFn>,
    pub validate_options: Capability<OptionsFn>,
    pub after_find: Capability<AfterFindFn>,
    pub policy: Option<AdapterPolicy>,
}

impl ProviderAdapter {
    /// An adapter with no capabilities at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// An adapter that starts from the default implementation: every
    /// capability slot holds the inherited no-op until overridden.
    pub fn base() -> Self {
        Self {
            validate_auth_data: Capability::Inherited,
            validate_app_id: Capability::Inherited,
            validate_set_up: Capability::Inherited,
            validate_login: Capability::Inherited,
            validate_update: Capability::Inherited,
            challenge: Capability::Inherited,
            validate_options: Capability::Inherited,
            after_find: Capability::Inherited,
            policy: Some(AdapterPolicy::Named("default".to_string())),
        }
    }

    pub fn with_validate_auth_data<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value, Value, ProviderRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IdentityResult<Value>> + Send + 'static,
    {
        self.validate_auth_data = Capability::Provided(boxed_auth_data_fn(f));
        self
    }

    pub fn with_validate_set_up<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value, Value, ProviderRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IdentityResult<Value>> + Send + 'static,
    {
        self.validate_set_up = Capability::Provided(boxed_auth_data_fn(f));
        self
    }

    pub fn with_validate_login<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value, Value, ProviderRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IdentityResult<Value>> + Send + 'static,
    {
        self.validate_login = Capability::Provided(boxed_auth_data_fn(f));
        self
    }

    pub fn with_validate_update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value, Value, ProviderRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IdentityResult<Value>> + Send + 'static,
    {
        self.validate_update = Capability::Provided(boxed_auth_data_fn(f));
        self
    }

    pub fn with_validate_app_id<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Vec<String>, Value, Value, ProviderRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IdentityResult<()>> + Send + 'static,
    {
        self.validate_app_id = Capability::Provided(Arc::new(
            move |app_ids, auth_data, options, request| {
                Box::pin(f(app_ids, auth_data, options, request)) as ProviderFuture<()>
            },
        ));
        self
    }

    pub fn with_challenge<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value, Value, Value, ProviderRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IdentityResult<Value>> + Send + 'static,
    {
        self.challenge = Capability::Provided(Arc::new(
            move |challenge, auth_data, options, request| {
                Box::pin(f(challenge, auth_data, options, request)) as ProviderFuture<Value>
            },
        ));
        self
    }

    pub fn with_validate_options<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> IdentityResult<()> + Send + Sync + 'static,
    {
        self.validate_options = Capability::Provided(Arc::new(f));
        self
    }

    pub fn with_after_find<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value, Value, ProviderRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IdentityResult<Option<Value>>> + Send + 'static,
    {
        self.after_find = Capability::Provided(Arc::new(move |stored, options, request| {
            Box::pin(f(stored, options, request)) as ProviderFuture<Option<Value>>
        }));
        self
    }

    pub fn with_policy(mut self, policy: AdapterPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Layer `overrides` on top of this adapter, slot by slot.
    pub fn overlay(&mut self, overrides: &ProviderAdapter) {
        self.validate_auth_data.overlay(&overrides.validate_auth_data);
        self.validate_app_id.overlay(&overrides.validate_app_id);
        self.validate_set_up.overlay(&overrides.validate_set_up);
        self.validate_login.overlay(&overrides.validate_login);
        self.validate_update.overlay(&overrides.validate_update);
        self.challenge.overlay(&overrides.challenge);
        self.validate_options.overlay(&overrides.validate_options);
        self.after_find.overlay(&overrides.after_find);
        if let Some(policy) = &overrides.policy {
            self.policy = Some(policy.clone());
        }
    }

    /// Clear every slot still holding the inherited default.
    pub fn normalize(&mut self) {
        self.validate_auth_data.normalize();
        self.validate_app_id.normalize();
        self.validate_set_up.normalize();
        self.validate_login.normalize();
        self.validate_update.normalize();
        self.challenge.normalize();
        self.validate_options.normalize();
        self.after_find.normalize();
    }

    /// The function bound to a lifecycle method, if implemented.
    pub fn lifecycle(&self, method: LifecycleMethod) -> Option<&AuthDataFn> {
        match method {
            LifecycleMethod::ValidateSetUp => self.validate_set_up.get(),
            LifecycleMethod::ValidateLogin => self.validate_login.get(),
            LifecycleMethod::ValidateUpdate => self.validate_update.get(),
        }
    }

    /// Lifecycle methods this adapter does not implement.
    pub fn missing_lifecycle_methods(&self) -> Vec<LifecycleMethod> {
        [
            LifecycleMethod::ValidateSetUp,
            LifecycleMethod::ValidateLogin,
            LifecycleMethod::ValidateUpdate,
        ]
        .into_iter()
        .filter(|method| self.lifecycle(*method).is_none())
        .collect()
    }
}
