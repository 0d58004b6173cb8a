//! Decides which lifecycle method a provider must run for a request.

use crate::loader::LoadedAdapter;
use serde_json::Value;
use std::sync::Arc;
use strata_auth_core::{AuthContext, Principal, ProviderRequest};
use strata_identity_core::{
    AuthDataFn, IdentityError, IdentityResult, LifecycleMethod, ProviderAdapter,
};
use tracing::debug;

const POLICY_MISCONFIGURED: &str = "AuthAdapter policy is not configured correctly. The value must be either \"solo\", \"additional\", \"default\" or undefined (will be handled as \"default\")";

const ADAPTER_NOT_CONFIGURED: &str = "Adapter is not configured. Implement either validateAuthData or all of the following: validateSetUp, validateLogin and validateUpdate";

/// Pick the lifecycle method for a caller's state.
///
/// | logged in | provider configured | method |
/// |---|---|---|
/// | yes | yes | `validateUpdate` |
/// | yes | no | `validateSetUp` |
/// | no | yes | `validateLogin` |
/// | no | no | `validateSetUp` |
pub fn select_lifecycle_method(is_logged_in: bool, has_auth_data_configured: bool) -> LifecycleMethod {
    match (is_logged_in, has_auth_data_configured) {
        (true, true) => LifecycleMethod::ValidateUpdate,
        (true, false) => LifecycleMethod::ValidateSetUp,
        (false, true) => LifecycleMethod::ValidateLogin,
        (false, false) => LifecycleMethod::ValidateSetUp,
    }
}

/// A lifecycle call bound to its arguments, run on demand.
pub struct DeferredValidator {
    method: AuthDataFn,
    auth_data: Value,
    provider_options: Value,
    request: ProviderRequest,
}

impl DeferredValidator {
    pub async fn run(self) -> IdentityResult<Value> {
        (self.method)(self.auth_data, self.provider_options, self.request).await
    }
}

/// The lifecycle method chosen for a request, ready to run.
pub struct ValidationDirective {
    pub method: LifecycleMethod,
    pub validator: DeferredValidator,
}

impl std::fmt::Debug for ValidationDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationDirective")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Result of running a provider's validator.
#[derive(Debug)]
pub enum ValidationOutcome {
    /// The provider implements `validateAuthData`, which already ran.
    Validated(Value),
    /// A lifecycle method was selected; the caller decides when to run it.
    Directive(ValidationDirective),
}

impl ValidationOutcome {
    /// Run the directive if there is one and return the provider's result.
    pub async fn resolve(self) -> IdentityResult<Value> {
        match self {
            ValidationOutcome::Validated(value) => Ok(value),
            ValidationOutcome::Directive(directive) => directive.validator.run().await,
        }
    }

    pub fn method(&self) -> Option<LifecycleMethod> {
        match self {
            ValidationOutcome::Validated(_) => None,
            ValidationOutcome::Directive(directive) => Some(directive.method),
        }
    }
}

/// Validator bound to one provider's merged adapter and configuration.
#[derive(Debug, Clone)]
pub struct AuthDataValidator {
    provider: String,
    adapter: Arc<ProviderAdapter>,
    app_ids: Option<Vec<String>>,
    provider_options: Value,
}

impl AuthDataValidator {
    pub fn new(provider: impl Into<String>, loaded: LoadedAdapter) -> Self {
        Self {
            provider: provider.into(),
            adapter: loaded.adapter,
            app_ids: loaded.app_ids,
            provider_options: loaded.provider_options,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn adapter(&self) -> &Arc<ProviderAdapter> {
        &self.adapter
    }

    pub fn provider_options(&self) -> &Value {
        &self.provider_options
    }

    /// Validate `auth_data` presented by a request.
    ///
    /// `principal` is the account the auth data is being attached to or logged
    /// into, when known.
    pub async fn validate(
        &self,
        auth_data: Value,
        auth: &AuthContext,
        principal: Option<&Principal>,
        request: ProviderRequest,
    ) -> IdentityResult<ValidationOutcome> {
        if let (Some(app_ids), Some(validate_app_id)) =
            (&self.app_ids, self.adapter.validate_app_id.get())
        {
            validate_app_id(
                app_ids.clone(),
                auth_data.clone(),
                self.provider_options.clone(),
                request.clone(),
            )
            .await?;
        }

        if let Some(policy) = &self.adapter.policy {
            if !policy.is_valid() {
                return Err(IdentityError::Configuration(POLICY_MISCONFIGURED.to_string()));
            }
        }

        if let Some(validate_auth_data) = self.adapter.validate_auth_data.get() {
            let result = validate_auth_data(auth_data, self.provider_options.clone(), request).await?;
            return Ok(ValidationOutcome::Validated(result));
        }

        let missing = self.adapter.missing_lifecycle_methods();
        if !missing.is_empty() {
            let missing: Vec<&str> = missing.iter().map(LifecycleMethod::as_str).collect();
            return Err(IdentityError::Configuration(format!(
                "{ADAPTER_NOT_CONFIGURED} (missing: {})",
                missing.join(", ")
            )));
        }

        let is_logged_in = auth.acts_as(principal);
        let has_auth_data_configured =
            principal.is_some_and(|p| p.auth_data.is_configured(&self.provider));
        let method = select_lifecycle_method(is_logged_in, has_auth_data_configured);

        debug!(
            provider = %self.provider,
            is_logged_in,
            has_auth_data_configured,
            method = %method,
            "Resolved auth lifecycle method"
        );

        let Some(lifecycle) = self.adapter.lifecycle(method) else {
            return Err(IdentityError::Configuration(ADAPTER_NOT_CONFIGURED.to_string()));
        };

        Ok(ValidationOutcome::Directive(ValidationDirective {
            method,
            validator: DeferredValidator {
                method: lifecycle.clone(),
                auth_data,
                provider_options: self.provider_options.clone(),
                request,
            },
        }))
    }
}
