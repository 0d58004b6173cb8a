//! Authentication context and error vocabulary shared across Strata services.
//!
//! This crate carries the request-scoped types every other crate agrees on:
//! - [`AuthContext`], [`Principal`] and [`AuthDataBundle`] describing who a request acts as
//! - [`PlatformError`] and [`ErrorCode`], the code + message errors clients see
//! - [`SessionStore`] for turning session tokens into an [`AuthContext`]

mod context;
mod error;
mod session;

pub use context::{AuthContext, AuthDataBundle, Principal, ProviderRequest};
pub use error::{ErrorCode, PlatformError};
pub use session::{InMemorySessionStore, SessionRecord, SessionStore};
