//! Per-request authorization decision.
//!
//! resolve applicable policies -> build principal (once) -> evaluate policies
//! (OR across policies, AND inside a policy) -> principal or typed failure.
use std::sync::Arc;

use axum::http::{HeaderMap, header};

use crate::services::auth::PrincipalBuilder;
use crate::services::authz::endpoints::EndpointPolicyResolver;
use crate::services::authz::error::{AuthnFailure, AuthzError};
use crate::services::authz::principal::Principal;
use crate::services::authz::registry::PolicyRegistry;

#[derive(Clone)]
pub struct AuthorizationEngine {
    policies: Arc<PolicyRegistry>,
    endpoints: Arc<dyn EndpointPolicyResolver>,
    principals: Arc<dyn PrincipalBuilder>,
}

impl std::fmt::Debug for AuthorizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationEngine")
            .field("policies", &self.policies.len())
            .finish_non_exhaustive()
    }
}

impl AuthorizationEngine {
    pub fn new(
        policies: Arc<PolicyRegistry>,
        endpoints: Arc<dyn EndpointPolicyResolver>,
        principals: Arc<dyn PrincipalBuilder>,
    ) -> Self {
        Self {
            policies,
            endpoints,
            principals,
        }
    }

    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    /// Authorize a request for `endpoint`.
    ///
    /// When no policy is declared for the endpoint the request is let through with an
    /// anonymous principal and the headers are not inspected.
    pub async fn authorize(
        &self,
        endpoint: &str,
        headers: &HeaderMap,
    ) -> Result<Principal, AuthzError> {
        let applicable = self.endpoints.resolve(endpoint);
        if applicable.is_empty() {
            tracing::debug!(endpoint, "no applicable policy, claims are not retrieved");
            return Ok(Principal::anonymous());
        }

        let token = bearer_token(headers)?;
        let principal = self.principals.build(token).await?;

        for name in &applicable {
            let policy = self.policies.get_policy(name)?;
            if policy.evaluate(&principal).await? {
                tracing::debug!(endpoint, policy = %name, "policy satisfied");
                return Ok(principal);
            }
            tracing::debug!(endpoint, policy = %name, "policy not satisfied");
        }

        Err(AuthzError::Forbidden)
    }
}

/// The single non-blank `Authorization` value of the request.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthzError> {
    let mut values = Vec::new();
    for value in headers.get_all(header::AUTHORIZATION) {
        let value = value.to_str().map_err(|e| {
            AuthzError::unauthenticated_with(AuthnFailure::Malformed, e)
        })?;
        if !value.trim().is_empty() {
            values.push(value);
        }
    }

    tracing::debug!(count = values.len(), "non-empty authorization header values");

    match values.as_slice() {
        [] => Err(AuthzError::unauthenticated(AuthnFailure::Missing)),
        [token] => Ok(*token),
        _ => Err(AuthzError::unauthenticated(AuthnFailure::Ambiguous)),
    }
}
