//! Failure taxonomy of the authorization pipeline.
//!
//! The gate maps each kind to a caller-visible outcome:
//! - `InvalidArgument` / `PolicyNotFound` -> client fault (400)
//! - `Authentication` -> unauthenticated (401)
//! - `Forbidden` -> access denied (403)
//! - `Internal` -> server fault (500)
use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Why a caller could not be authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthnFailure {
    /// No non-blank `Authorization` value.
    Missing,
    /// More than one non-blank `Authorization` value.
    Ambiguous,
    /// Header value is not visible ASCII.
    Malformed,
    /// Signature, issuer, lifetime or claim validation failed.
    InvalidToken,
    /// None of the discovery endpoints could be resolved.
    NoTrustAnchors,
}

impl fmt::Display for AuthnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Missing => "missing",
            Self::Ambiguous => "ambiguous",
            Self::Malformed => "malformed",
            Self::InvalidToken => "invalid token",
            Self::NoTrustAnchors => "no trust anchors",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("the policy '{0}' could not be found")]
    PolicyNotFound(String),

    #[error("authentication failed: {failure}")]
    Authentication {
        failure: AuthnFailure,
        #[source]
        source: Option<BoxError>,
    },

    #[error("access denied")]
    Forbidden,

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl AuthzError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn unauthenticated(failure: AuthnFailure) -> Self {
        Self::Authentication {
            failure,
            source: None,
        }
    }

    pub fn unauthenticated_with(failure: AuthnFailure, source: impl Into<BoxError>) -> Self {
        Self::Authentication {
            failure,
            source: Some(source.into()),
        }
    }

    /// `Some(failure)` when this is an authentication error.
    pub fn authn_failure(&self) -> Option<AuthnFailure> {
        match self {
            Self::Authentication { failure, .. } => Some(*failure),
            _ => None,
        }
    }

    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::PolicyNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_error_keeps_its_cause() {
        let err = AuthzError::unauthenticated_with(
            AuthnFailure::InvalidToken,
            std::io::Error::other("bad signature"),
        );

        assert_eq!(err.authn_failure(), Some(AuthnFailure::InvalidToken));
        assert_eq!(err.to_string(), "authentication failed: invalid token");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("bad signature"));
    }

    #[test]
    fn missing_and_ambiguous_render_their_reason() {
        assert_eq!(
            AuthzError::unauthenticated(AuthnFailure::Missing).to_string(),
            "authentication failed: missing"
        );
        assert_eq!(
            AuthzError::unauthenticated(AuthnFailure::Ambiguous).to_string(),
            "authentication failed: ambiguous"
        );
    }

    #[test]
    fn unknown_policy_is_a_client_fault() {
        assert!(AuthzError::PolicyNotFound("Admin".into()).is_client_fault());
        assert!(!AuthzError::Forbidden.is_client_fault());
    }
}
