//! Policy model and authorization engine.
//!
//! Policy names, endpoint keys and claim types are compared ASCII
//! case-insensitively; other characters must match exactly.
pub mod endpoints;
pub mod engine;
pub mod error;
pub mod policy;
pub mod principal;
pub mod registry;
pub mod requirement;

pub use endpoints::{EndpointPolicies, EndpointPolicyResolver, endpoint_key};
pub use engine::AuthorizationEngine;
pub use error::{AuthnFailure, AuthzError};
pub use policy::{Policy, PolicyBuilder};
pub use principal::{Identity, Principal};
pub use registry::{DEFAULT_POLICY, PolicyRegistry};
pub use requirement::{AuthorizationRequirement, ClaimsMatch, Requirement};
