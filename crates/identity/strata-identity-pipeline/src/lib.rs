//! Third-party credential validation pipeline.
//!
//! Resolution happens in three steps:
//! 1. [`ProviderRegistry`] finds the base adapter for a provider name
//! 2. [`load_auth_adapter`] layers the operator configuration on top of it
//! 3. [`AuthDataValidator`] decides, per request, which lifecycle method runs
//!
//! [`AuthPipeline`] ties the steps together for one application instance.

mod loader;
mod pipeline;
pub mod providers;
mod registry;
mod resolver;

pub use loader::{LoadedAdapter, load_auth_adapter};
pub use pipeline::{AuthPipeline, ProviderValidator};
pub use registry::{AdapterSource, ProviderRegistry};
pub use resolver::{
    AuthDataValidator, DeferredValidator, ValidationDirective, ValidationOutcome,
    select_lifecycle_method,
};

// Re-export common types for convenience
pub use strata_identity_core::{
    AuthOptions, IdentityError, IdentityResult, LifecycleMethod, ProviderAdapter, ProviderConfig,
};
