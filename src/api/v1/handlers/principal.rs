/*
 * Responsibility
 * - Handlers behind the gate; they only read the principal the gate published
 */
use axum::Json;
use serde_json::{Value, json};

use crate::api::v1::dto::principal::PrincipalResponse;
use crate::middleware::authz::CurrentPrincipal;

pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Json<PrincipalResponse> {
    Json(PrincipalResponse::from(&principal))
}

pub async fn admin(CurrentPrincipal(principal): CurrentPrincipal) -> Json<Value> {
    Json(json!({
        "area": "admin",
        "subject": principal.subject(),
    }))
}

pub async fn reports(CurrentPrincipal(principal): CurrentPrincipal) -> Json<Value> {
    let roles: Vec<&str> = principal.values_of("roles").collect();
    Json(json!({
        "area": "reports",
        "subject": principal.subject(),
        "roles": roles,
    }))
}
