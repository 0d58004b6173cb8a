//! Core identity provider contract.
//!
//! A provider is a named set of optional capabilities ([`ProviderAdapter`]).
//! Operators configure providers through [`AuthOptions`]; the pipeline crate
//! merges built-in adapters with that configuration and decides which
//! lifecycle method runs for a request.

mod adapter;
mod config;
mod error;

pub use adapter::{
    AdapterPolicy, AfterFindFn, AppIdFn, AuthDataFn, AuthPolicy, Capability, ChallengeFn,
    LifecycleMethod, OptionsFn, PolicyFn, ProviderAdapter, ProviderFuture,
};
pub use config::{AuthOptions, ProviderConfig};
pub use error::{IdentityError, IdentityResult};

// Re-export common types for convenience
pub use strata_auth_core::{AuthContext, AuthDataBundle, Principal, ProviderRequest};
