//! Atomic authorization rules evaluated against a principal.
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::services::authz::error::AuthzError;
use crate::services::authz::principal::Principal;

/// Extension point for requirements that are not built in.
///
/// Implementations must be side-effect free with respect to the decision: evaluating
/// the same principal twice yields the same answer. They may perform I/O (for example
/// a claims lookup); an `Err` is treated as an unclassified failure of the request.
#[async_trait]
pub trait AuthorizationRequirement: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn evaluate(&self, principal: &Principal) -> anyhow::Result<bool>;
}

/// Claim presence check, optionally restricted to a set of allowed values.
///
/// The claim type is matched case-insensitively, values are matched exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsMatch {
    claim_type: String,
    allowed_values: Vec<String>,
}

impl ClaimsMatch {
    pub fn new<I, S>(claim_type: impl Into<String>, allowed_values: I) -> Result<Self, AuthzError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let claim_type = claim_type.into();
        if claim_type.trim().is_empty() {
            return Err(AuthzError::invalid_argument("claim type must not be blank"));
        }

        Ok(Self {
            claim_type,
            allowed_values: allowed_values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn claim_type(&self) -> &str {
        &self.claim_type
    }

    pub fn allowed_values(&self) -> &[String] {
        &self.allowed_values
    }

    pub fn matches(&self, principal: &Principal) -> bool {
        if !principal.is_authenticated() {
            return false;
        }

        let mut values = principal.values_of(&self.claim_type);
        if self.allowed_values.is_empty() {
            values.next().is_some()
        } else {
            values.any(|value| self.allowed_values.iter().any(|allowed| allowed == value))
        }
    }
}

#[derive(Clone)]
pub enum Requirement {
    /// Satisfied when the principal carries at least one identity.
    AuthenticatedUser,
    ClaimsMatch(ClaimsMatch),
    Custom(Arc<dyn AuthorizationRequirement>),
}

impl Requirement {
    pub fn claim<I, S>(claim_type: impl Into<String>, allowed_values: I) -> Result<Self, AuthzError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClaimsMatch::new(claim_type, allowed_values).map(Self::ClaimsMatch)
    }

    pub fn custom(requirement: impl AuthorizationRequirement + 'static) -> Self {
        Self::Custom(Arc::new(requirement))
    }

    pub async fn evaluate(&self, principal: &Principal) -> Result<bool, AuthzError> {
        match self {
            Self::AuthenticatedUser => Ok(principal.is_authenticated()),
            Self::ClaimsMatch(claims) => Ok(claims.matches(principal)),
            Self::Custom(requirement) => requirement.evaluate(principal).await.map_err(|e| {
                AuthzError::Internal(e.context(format!(
                    "requirement '{}' failed to evaluate",
                    requirement.name()
                )))
            }),
        }
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticatedUser => f.write_str("AuthenticatedUser"),
            Self::ClaimsMatch(claims) => f.debug_tuple("ClaimsMatch").field(claims).finish(),
            Self::Custom(requirement) => f.debug_tuple("Custom").field(&requirement.name()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::authz::principal::Identity;

    fn principal_with(claims: &[(&str, &str)]) -> Principal {
        let identity = claims
            .iter()
            .fold(Identity::new("test"), |id, (t, v)| id.with_claim(*t, *v));
        Principal::new(vec![identity])
    }

    #[tokio::test]
    async fn authenticated_user_requires_an_identity() {
        let requirement = Requirement::AuthenticatedUser;
        assert!(!requirement.evaluate(&Principal::anonymous()).await.unwrap());
        assert!(requirement.evaluate(&principal_with(&[])).await.unwrap());
    }

    #[test]
    fn blank_claim_type_is_rejected() {
        let err = ClaimsMatch::new("  ", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn claim_without_values_only_checks_presence() {
        let requirement = Requirement::claim("ROLES", Vec::<String>::new()).unwrap();
        assert!(requirement.evaluate(&principal_with(&[("roles", "x")])).await.unwrap());
        assert!(!requirement.evaluate(&principal_with(&[("scope", "x")])).await.unwrap());
        assert!(!requirement.evaluate(&Principal::anonymous()).await.unwrap());
    }

    #[tokio::test]
    async fn claim_values_are_matched_exactly() {
        let requirement = Requirement::claim("roles", ["admin", "owner"]).unwrap();
        assert!(requirement.evaluate(&principal_with(&[("roles", "owner")])).await.unwrap());
        assert!(!requirement.evaluate(&principal_with(&[("roles", "Admin")])).await.unwrap());
        assert!(!requirement.evaluate(&principal_with(&[("groups", "admin")])).await.unwrap());
    }

    #[tokio::test]
    async fn any_matching_value_across_identities_is_enough() {
        let principal = Principal::new(vec![
            Identity::new("a").with_claim("roles", "reader"),
            Identity::new("b").with_claim("roles", "admin"),
        ]);
        let requirement = Requirement::claim("roles", ["admin"]).unwrap();
        assert!(requirement.evaluate(&principal).await.unwrap());
    }

    struct Broken;

    #[async_trait]
    impl AuthorizationRequirement for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn evaluate(&self, _principal: &Principal) -> anyhow::Result<bool> {
            anyhow::bail!("claims store unavailable")
        }
    }

    #[tokio::test]
    async fn custom_requirement_failure_is_internal() {
        let err = Requirement::custom(Broken)
            .evaluate(&principal_with(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Internal(_)));
        assert!(err.to_string().contains("broken"));
    }
}
