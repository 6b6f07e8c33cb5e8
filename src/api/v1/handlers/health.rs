/*
 * Responsibility
 * - GET /health (liveness; declares no policy, so the gate lets it through)
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}
