//! Generic OAuth2 provider backed by RFC 7662 token introspection.
//!
//! Selected for any provider whose operator block sets `oauth2: true`.
//! Recognised options:
//! - `tokenIntrospectionEndpointUrl` (required)
//! - `authorizationHeader`, sent verbatim as `Authorization`
//! - `useridField`, the introspection field that must equal `authData.id`
//! - `appidField`, the introspection field checked against `appIds`

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use strata_auth_core::{ErrorCode, PlatformError};
use strata_identity_core::{IdentityError, IdentityResult, ProviderAdapter};
use tracing::{debug, error};

const INVALID_TOKEN: &str = "OAuth2 access token is invalid for this user.";

/// The options the adapter reads from its operator block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionOptions {
    pub token_introspection_endpoint_url: Option<String>,
    pub authorization_header: Option<String>,
    pub userid_field: Option<String>,
    pub appid_field: Option<String>,
    pub app_ids: Option<Vec<String>>,
}

impl IntrospectionOptions {
    fn parse(options: &Value) -> IdentityResult<Self> {
        if options.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(options.clone())
            .map_err(|e| IdentityError::InvalidOptions(e.to_string()))
    }

    pub fn validate(options: &Value) -> IdentityResult<()> {
        if options.is_null() {
            return Err(IdentityError::InvalidOptions(
                "OAuth2 options are required.".to_string(),
            ));
        }
        let parsed = Self::parse(options)?;
        if parsed.token_introspection_endpoint_url.is_none() {
            return Err(IdentityError::InvalidOptions(
                "OAuth2 token introspection endpoint URL is missing.".to_string(),
            ));
        }
        if parsed.appid_field.is_some() && parsed.app_ids.as_ref().is_none_or(Vec::is_empty) {
            return Err(IdentityError::InvalidOptions(
                "OAuth2 configuration is missing app IDs.".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct OAuth2AuthData {
    access_token: Option<String>,
    id: Option<Value>,
}

impl OAuth2AuthData {
    fn parse(auth_data: Value) -> IdentityResult<Self> {
        serde_json::from_value(auth_data)
            .map_err(|_| IdentityError::rejected("OAuth2 auth data is malformed."))
    }
}

/// HTTP side of the generic OAuth2 adapter.
#[derive(Clone)]
pub struct OAuth2IntrospectionProvider {
    http_client: Client,
}

impl OAuth2IntrospectionProvider {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { http_client }
    }

    /// Expose this provider as an adapter.
    pub fn into_adapter(self) -> ProviderAdapter {
        let provider = Arc::new(self);
        let for_auth_data = provider.clone();
        let for_app_id = provider;

        ProviderAdapter::new()
            .with_validate_options(IntrospectionOptions::validate)
            .with_validate_auth_data(move |auth_data, options, _request| {
                let provider = for_auth_data.clone();
                async move { provider.validate_auth_data(auth_data, options).await }
            })
            .with_validate_app_id(move |app_ids, auth_data, options, _request| {
                let provider = for_app_id.clone();
                async move { provider.validate_app_id(app_ids, auth_data, options).await }
            })
    }

    async fn validate_auth_data(&self, auth_data: Value, options: Value) -> IdentityResult<Value> {
        let options = IntrospectionOptions::parse(&options)?;
        let auth_data = OAuth2AuthData::parse(auth_data)?;
        let response = self
            .introspect(&options, auth_data.access_token.as_deref())
            .await?;

        if !is_active(&response) {
            return Err(IdentityError::rejected(INVALID_TOKEN));
        }
        if let Some(userid_field) = &options.userid_field {
            let subject = response.get(userid_field);
            if subject.is_none() || subject != auth_data.id.as_ref() {
                return Err(IdentityError::rejected(INVALID_TOKEN));
            }
        }

        Ok(json!({}))
    }

    async fn validate_app_id(
        &self,
        app_ids: Vec<String>,
        auth_data: Value,
        options: Value,
    ) -> IdentityResult<()> {
        let options = IntrospectionOptions::parse(&options)?;
        let Some(appid_field) = options.appid_field.clone() else {
            return Ok(());
        };
        if app_ids.is_empty() {
            return Err(IdentityError::AppIdentity(
                "OAuth2 configuration is missing the client app IDs (\"appIds\" config parameter)."
                    .to_string(),
            ));
        }

        let auth_data = OAuth2AuthData::parse(auth_data)?;
        let response = self
            .introspect(&options, auth_data.access_token.as_deref())
            .await?;
        if !is_active(&response) {
            return Err(IdentityError::rejected(INVALID_TOKEN));
        }

        let permitted = match response.get(&appid_field) {
            None | Some(Value::Null) => {
                return Err(IdentityError::rejected(format!(
                    "OAuth2 token introspection response is missing \"{appid_field}\"."
                )));
            }
            Some(Value::String(app_id)) => app_ids.contains(app_id),
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .any(|app_id| app_ids.iter().any(|permitted| permitted == app_id)),
            Some(_) => false,
        };

        if permitted {
            Ok(())
        } else {
            Err(IdentityError::AppIdentity(
                "OAuth2: the access_token's appID is empty or is not in the list of permitted appIDs in the auth configuration."
                    .to_string(),
            ))
        }
    }

    async fn introspect(
        &self,
        options: &IntrospectionOptions,
        access_token: Option<&str>,
    ) -> IdentityResult<Value> {
        let url = options.token_introspection_endpoint_url.as_ref().ok_or_else(|| {
            IdentityError::rejected("OAuth2 token introspection endpoint URL is missing from configuration!")
        })?;

        let mut request = self
            .http_client
            .post(url)
            .form(&[("token", access_token.unwrap_or_default())]);
        if let Some(header) = &options.authorization_header {
            request = request.header(reqwest::header::AUTHORIZATION, header);
        }

        let response = request.send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            let status = response.status();
            error!("Token introspection failed with status {}", status);
            return Err(IdentityError::rejected(INVALID_TOKEN));
        }

        let body: Value = response.json().await.map_err(transport_error)?;
        debug!("Token introspection succeeded");
        Ok(body)
    }
}

impl Default for OAuth2IntrospectionProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn is_active(response: &Value) -> bool {
    response.get("active").and_then(Value::as_bool).unwrap_or(false)
}

fn transport_error(err: reqwest::Error) -> IdentityError {
    IdentityError::ProviderValidation(PlatformError::new(
        ErrorCode::CONNECTION_FAILED,
        err.to_string(),
    ))
}
