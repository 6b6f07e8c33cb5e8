pub mod discovery;
pub mod principal_builder;

pub use discovery::{DiscoveryFetcher, HttpDiscoveryFetcher, TrustAnchor, TrustResolver};
pub use principal_builder::{JwtPrincipalBuilder, PrincipalBuilder};
