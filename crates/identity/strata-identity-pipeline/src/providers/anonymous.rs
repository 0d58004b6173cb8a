//! Anonymous users: any auth data is accepted as-is.

use serde_json::Value;
use strata_identity_core::ProviderAdapter;

pub const PROVIDER_ID: &str = "anonymous";

pub fn adapter() -> ProviderAdapter {
    ProviderAdapter::new()
        .with_validate_auth_data(|_, _, _| async move { Ok(Value::Null) })
        .with_validate_app_id(|_, _, _, _| async move { Ok(()) })
}
