//! Controller error types.

use crate::request::BatchItem;
use strata_auth_core::{ErrorCode, PlatformError};
use thiserror::Error;

pub type ControllerResult<T> = Result<T, ControllerError>;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("{0}")]
    Platform(#[from] PlatformError),

    /// A transactional batch was rolled back. Carries every sub-result, not
    /// just the failing ones.
    #[error("Batch aborted: {} of {} operations failed", failed_count(.0), .0.len())]
    BatchAborted(Vec<BatchItem>),

    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn failed_count(items: &[BatchItem]) -> usize {
    items.iter().filter(|item| item.is_error()).count()
}

impl ControllerError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ControllerError::Platform(err) => Some(err.code),
            ControllerError::Network(_) => Some(ErrorCode::CONNECTION_FAILED),
            ControllerError::Serialization(_) => Some(ErrorCode::INVALID_JSON),
            ControllerError::BatchAborted(_) => None,
        }
    }

    /// The code + message form used for batch sub-results.
    pub fn into_platform_error(self) -> PlatformError {
        match self {
            ControllerError::Platform(err) => err,
            other => {
                let code = other.code().unwrap_or(ErrorCode::OTHER_CAUSE);
                PlatformError::new(code, other.to_string())
            }
        }
    }
}
