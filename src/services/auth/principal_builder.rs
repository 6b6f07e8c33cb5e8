//! Bearer token -> verified principal.
//!
//! The token is accepted when its signature verifies against any key of any
//! resolved trust anchor and its `iss` names any resolved issuer. Audience is not
//! checked here; use a claim requirement when a policy needs it.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde_json::Value;

use crate::services::auth::discovery::TrustResolver;
use crate::services::authz::error::{AuthnFailure, AuthzError};
use crate::services::authz::principal::{Identity, Principal};

/// Signature algorithms accepted on bearer tokens. Verification keys come from
/// public key sets, so HMAC algorithms are never accepted.
pub const ACCEPTED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Builds a verified principal from a raw bearer token.
#[async_trait]
pub trait PrincipalBuilder: Send + Sync {
    async fn build(&self, token: &str) -> Result<Principal, AuthzError>;
}

/// JWT validation against the trust set of a [`TrustResolver`].
#[derive(Debug, Clone)]
pub struct JwtPrincipalBuilder {
    trust: Arc<TrustResolver>,
    leeway_seconds: u64,
}

impl JwtPrincipalBuilder {
    pub fn new(trust: Arc<TrustResolver>, leeway_seconds: u64) -> Self {
        Self {
            trust,
            leeway_seconds,
        }
    }
}

/// Strip an optional `Bearer` scheme marker.
pub fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    match token.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => token,
    }
}

#[async_trait]
impl PrincipalBuilder for JwtPrincipalBuilder {
    async fn build(&self, token: &str) -> Result<Principal, AuthzError> {
        let token = strip_bearer(token);
        if token.is_empty() {
            return Err(AuthzError::invalid_argument("the token is blank"));
        }

        let header = decode_header(token).map_err(|e| {
            tracing::debug!(error = %e, "unreadable token");
            AuthzError::invalid_argument("unable to read the token, it is malformed")
        })?;

        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            tracing::debug!(alg = ?header.alg, "token signed with a rejected algorithm");
            return Err(AuthzError::unauthenticated_with(
                AuthnFailure::InvalidToken,
                format!("signature algorithm {:?} is not accepted", header.alg),
            ));
        }

        let anchors = self.trust.anchors().await?;

        let issuers: Vec<&str> = anchors.iter().map(|a| a.issuer.as_str()).collect();
        // pinned to the (accepted) header algorithm
        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&issuers);
        validation.validate_aud = false;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.leeway = self.leeway_seconds;

        let kid = header.kid.as_deref();
        let mut last_error = None;

        for key in anchors.iter().flat_map(|a| a.candidate_keys(kid)) {
            match decode::<HashMap<String, Value>>(token, key, &validation) {
                Ok(data) => {
                    let identity = Identity::from_jwt_claims(data.claims);
                    return Ok(Principal::new(vec![identity]));
                }
                // another anchor may hold the right key
                Err(e) if is_key_mismatch(e.kind()) => last_error = Some(e),
                Err(e) => {
                    tracing::debug!(error = %e, "token rejected");
                    return Err(AuthzError::unauthenticated_with(AuthnFailure::InvalidToken, e));
                }
            }
        }

        Err(match last_error {
            Some(e) => AuthzError::unauthenticated_with(AuthnFailure::InvalidToken, e),
            None => AuthzError::unauthenticated_with(
                AuthnFailure::InvalidToken,
                "no trusted signing key matches the token",
            ),
        })
    }
}

fn is_key_mismatch(kind: &ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey
    )
}
