//! Policy-based authorization for axum handlers.
//!
//! Bearer tokens are validated against issuers discovered through OpenID Connect
//! discovery documents; named policies (AND of requirements) are evaluated per
//! handler, any satisfied policy granting access.
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
