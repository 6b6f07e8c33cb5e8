/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 * - Cheap to clone: everything inside is behind an Arc and read-only after startup
 */
use std::sync::Arc;

use crate::services::authz::AuthorizationEngine;

#[derive(Clone, Debug)]
pub struct AppState {
    pub authz: Arc<AuthorizationEngine>,
}

impl AppState {
    pub fn new(authz: Arc<AuthorizationEngine>) -> Self {
        Self { authz }
    }
}
