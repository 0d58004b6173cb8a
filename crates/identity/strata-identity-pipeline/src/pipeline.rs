//! Application-wide entry point for third-party credential validation.

use crate::loader::load_auth_adapter;
use crate::registry::ProviderRegistry;
use crate::resolver::AuthDataValidator;
use futures::future::try_join_all;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use strata_auth_core::{AuthContext, AuthDataBundle};
use strata_identity_core::{AuthOptions, IdentityError, IdentityResult, ProviderAdapter};
use tracing::debug;

const ANONYMOUS: &str = "anonymous";

/// What [`AuthPipeline::get_validator_for_provider`] hands back for a known provider.
///
/// `validator` is `None` when the provider exists but is switched off; callers
/// must treat that the same as an unsupported provider.
#[derive(Debug, Clone)]
pub struct ProviderValidator {
    pub validator: Option<AuthDataValidator>,
    pub adapter: Option<Arc<ProviderAdapter>>,
}

/// Owns the provider configuration and the anonymous-users switch for one
/// application instance.
pub struct AuthPipeline {
    auth_options: AuthOptions,
    registry: ProviderRegistry,
    enable_anonymous_users: AtomicBool,
}

impl AuthPipeline {
    pub fn new(auth_options: AuthOptions, enable_anonymous_users: bool) -> Self {
        Self::with_registry(auth_options, enable_anonymous_users, ProviderRegistry::with_builtins())
    }

    pub fn with_registry(
        auth_options: AuthOptions,
        enable_anonymous_users: bool,
        registry: ProviderRegistry,
    ) -> Self {
        Self {
            auth_options,
            registry,
            enable_anonymous_users: AtomicBool::new(enable_anonymous_users),
        }
    }

    pub fn set_enable_anonymous_users(&self, enable: bool) {
        self.enable_anonymous_users.store(enable, Ordering::Release);
    }

    pub fn anonymous_users_enabled(&self) -> bool {
        self.enable_anonymous_users.load(Ordering::Acquire)
    }

    /// Look up the validator for `provider`.
    ///
    /// `Ok(None)` means the name is not a provider. Errors come from the
    /// adapter's `validateOptions`.
    pub fn get_validator_for_provider(
        &self,
        provider: &str,
    ) -> IdentityResult<Option<ProviderValidator>> {
        if provider == ANONYMOUS && !self.anonymous_users_enabled() {
            debug!("Anonymous users are disabled");
            return Ok(Some(ProviderValidator {
                validator: None,
                adapter: None,
            }));
        }

        let Some(loaded) = load_auth_adapter(&self.registry, provider, &self.auth_options)? else {
            return Ok(None);
        };
        let adapter = loaded.adapter.clone();
        Ok(Some(ProviderValidator {
            validator: Some(AuthDataValidator::new(provider, loaded)),
            adapter: Some(adapter),
        }))
    }

    /// Give each provider in `auth_data` a chance to rewrite its stored blob
    /// before it leaves the server. Providers run concurrently; the first
    /// failure is returned.
    pub async fn run_after_find(
        &self,
        auth: &AuthContext,
        auth_data: &mut AuthDataBundle,
    ) -> IdentityResult<()> {
        let request = auth.provider_request();
        let mut pending = Vec::new();

        for provider in auth_data.providers() {
            let Some(ProviderValidator {
                validator: Some(validator),
                ..
            }) = self.get_validator_for_provider(provider)?
            else {
                continue;
            };
            let Some(after_find) = validator.adapter().after_find.get().cloned() else {
                continue;
            };
            let stored = auth_data.get(provider).cloned().unwrap_or(Value::Null);
            let options = validator.provider_options().clone();
            let request = request.clone();
            let provider = provider.to_string();

            pending.push(async move {
                let replacement = after_find(stored, options, request).await?;
                Ok::<_, IdentityError>((provider, replacement))
            });
        }

        for (provider, replacement) in try_join_all(pending).await? {
            if let Some(value) = replacement.filter(AuthDataBundle::is_linked) {
                auth_data.insert(provider, value);
            }
        }
        Ok(())
    }

    /// Run `provider`'s challenge step, if it has one.
    pub async fn challenge(
        &self,
        provider: &str,
        challenge_data: Value,
        auth_data: Value,
        auth: &AuthContext,
    ) -> IdentityResult<Option<Value>> {
        let Some(ProviderValidator {
            validator: Some(validator),
            ..
        }) = self.get_validator_for_provider(provider)?
        else {
            return Ok(None);
        };
        let Some(challenge) = validator.adapter().challenge.get() else {
            return Ok(None);
        };

        challenge(
            challenge_data,
            auth_data,
            validator.provider_options().clone(),
            auth.provider_request(),
        )
        .await
        .map(Some)
    }
}
