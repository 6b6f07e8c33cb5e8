/*
 * Responsibility
 * - v1 URL structure
 * - Which policies guard which route (registration table consumed by the gate)
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{
    health::health,
    principal::{admin, me, reports},
};
use crate::services::authz::{EndpointPolicies, endpoint_key};
use crate::state::AppState;

pub const PREFIX: &str = "/api/v1";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/me", get(me))
        .route("/admin", get(admin))
        .route("/reports", get(reports))
}

/// Policies per v1 route, keyed the way the gate computes keys.
pub fn endpoint_policies() -> EndpointPolicies {
    let key = |path: &str| endpoint_key("GET", &format!("{PREFIX}{path}"));

    EndpointPolicies::new()
        .authenticated(&key("/me"))
        .authorize(&key("/admin"), "Admin")
        .authorize_any(&key("/reports"), ["Admin", "Auditor"])
}
