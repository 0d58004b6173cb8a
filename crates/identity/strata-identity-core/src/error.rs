//! Identity pipeline error types.

use strata_auth_core::{ErrorCode, PlatformError};
use thiserror::Error;

pub type IdentityResult<T> = Result<T, IdentityError>;

#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// The adapter's policy or capability set is malformed. Never retried.
    #[error("{0}")]
    Configuration(String),

    /// The credential was issued for an application this server does not accept.
    #[error("App identity mismatch: {0}")]
    AppIdentity(String),

    /// A provider's lifecycle method rejected the credential.
    #[error("{0}")]
    ProviderValidation(PlatformError),

    /// The operator configuration block was rejected by `validateOptions`.
    #[error("Invalid provider options: {0}")]
    InvalidOptions(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("{0}")]
    Platform(#[from] PlatformError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl IdentityError {
    /// A provider rejection with the conventional "not found" code.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::ProviderValidation(PlatformError::object_not_found(message))
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<IdentityError> for PlatformError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Configuration(message) => PlatformError::other_cause(message),
            IdentityError::AppIdentity(message) => PlatformError::object_not_found(message),
            IdentityError::ProviderValidation(inner) | IdentityError::Platform(inner) => inner,
            IdentityError::InvalidOptions(message) => {
                PlatformError::new(ErrorCode::INTERNAL_SERVER_ERROR, message)
            }
            IdentityError::ProviderNotFound(_) => PlatformError::new(
                ErrorCode::UNSUPPORTED_SERVICE,
                "This authentication method is unsupported.",
            ),
            IdentityError::Serialization(message) => {
                PlatformError::new(ErrorCode::INVALID_JSON, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_platform_codes() {
        let err: PlatformError = IdentityError::Configuration("bad policy".into()).into();
        assert_eq!(err.code, ErrorCode::OTHER_CAUSE);
        assert_eq!(err.message, "bad policy");

        let err: PlatformError = IdentityError::ProviderNotFound("nope".into()).into();
        assert_eq!(err.code, ErrorCode::UNSUPPORTED_SERVICE);

        let inner = PlatformError::new(ErrorCode(141), "custom");
        let err: PlatformError = IdentityError::ProviderValidation(inner.clone()).into();
        assert_eq!(err, inner);
    }
}
