//! Request gate: runs the authorization engine in front of every routed handler.
//!
//! Start -> no applicable policy -> allow (anonymous principal)
//! Start -> token extraction -> principal built -> policy evaluation -> allow | forbidden
//!
//! On allow the [`Principal`] is stored in the request extensions (the request-scoped
//! lookup documented as [`PRINCIPAL_CONTEXT_KEY`]) and the handler runs. Any failure
//! short-circuits with the mapped error response; the handler is never invoked.
use std::convert::Infallible;
use std::error::Error as StdError;

use axum::{
    Router,
    body::Body,
    extract::{FromRequestParts, MatchedPath, State},
    http::{Request, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::error::AppError;
use crate::services::authz::{AuthzError, Principal, endpoint_key};
use crate::state::AppState;

/// Name under which the verified principal is published to downstream handlers.
/// Extensions are type-keyed, so the lookup itself goes through [`CurrentPrincipal`].
pub const PRINCIPAL_CONTEXT_KEY: &str = "claimsPrincipal";

/// Gate every route currently registered on `router`.
///
/// Uses `route_layer` so the matched route path is known and unmatched requests
/// still fall through to the 404 fallback.
///
/// ```ignore
/// let router = Router::new().nest("/api/v1", api::v1::routes());
/// let router = middleware::authz::apply(router, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state, authorize_middleware))
}

async fn authorize_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str())
        .unwrap_or_else(|| req.uri().path());
    let endpoint = endpoint_key(req.method().as_str(), path);

    match state.authz.authorize(&endpoint, req.headers()).await {
        Ok(principal) => {
            tracing::debug!(
                endpoint = %endpoint,
                authenticated = principal.is_authenticated(),
                subject = principal.subject().unwrap_or("-"),
                "request authorized"
            );
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(err) => {
            log_failure(&endpoint, &err);
            AppError::from(err).into_response()
        }
    }
}

fn log_failure(endpoint: &str, err: &AuthzError) {
    let cause = error_chain(err);
    match err {
        AuthzError::InvalidArgument(_) => {
            warn!(endpoint, error = %cause, "an invalid argument has been passed")
        }
        AuthzError::PolicyNotFound(_) => {
            error!(endpoint, error = %cause, "endpoint declares an unknown policy")
        }
        AuthzError::Authentication { .. } => {
            warn!(endpoint, error = %cause, "an unauthenticated request has been detected")
        }
        AuthzError::Forbidden => {
            error!(endpoint, error = %cause, "an unauthorized request has been detected")
        }
        AuthzError::Internal(_) => {
            error!(endpoint, error = %cause, "unhandled error while authorizing request")
        }
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        out.push_str(": ");
        out.push_str(&e.to_string());
        source = e.source();
    }
    out
}

/// Principal attached by the gate, or an anonymous one when the route is not gated.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentPrincipal(
            parts
                .extensions
                .get::<Principal>()
                .cloned()
                .unwrap_or_default(),
        ))
    }
}
