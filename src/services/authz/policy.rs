use crate::services::authz::error::AuthzError;
use crate::services::authz::principal::Principal;
use crate::services::authz::requirement::{AuthorizationRequirement, Requirement};

/// Named AND-combination of requirements. Immutable once built.
#[derive(Debug, Clone)]
pub struct Policy {
    name: String,
    requirements: Vec<Requirement>,
}

impl Policy {
    pub fn builder(name: impl Into<String>) -> PolicyBuilder {
        PolicyBuilder {
            name: name.into(),
            requirements: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Policy made of exactly one requirement.
    pub fn single(name: impl Into<String>, requirement: Requirement) -> Self {
        Self {
            name: name.into(),
            requirements: vec![requirement],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Evaluate requirements in declaration order, stopping at the first failure.
    ///
    /// A requirement only starts once the previous one has completed.
    pub async fn evaluate(&self, principal: &Principal) -> Result<bool, AuthzError> {
        for requirement in &self.requirements {
            if !requirement.evaluate(principal).await? {
                tracing::debug!(policy = %self.name, ?requirement, "requirement not satisfied");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug)]
pub struct PolicyBuilder {
    name: String,
    requirements: Vec<Requirement>,
    errors: Vec<AuthzError>,
}

impl PolicyBuilder {
    pub fn add_requirement(&mut self, requirement: Requirement) -> &mut Self {
        self.requirements.push(requirement);
        self
    }

    pub fn add_custom(&mut self, requirement: impl AuthorizationRequirement + 'static) -> &mut Self {
        self.add_requirement(Requirement::custom(requirement))
    }

    pub fn require_authenticated_user(&mut self) -> &mut Self {
        self.add_requirement(Requirement::AuthenticatedUser)
    }

    /// Require a claim of `claim_type`, whatever its value.
    pub fn require_claim(&mut self, claim_type: impl Into<String>) -> &mut Self {
        self.require_claim_values(claim_type, Vec::<String>::new())
    }

    /// Require a claim of `claim_type` whose value is one of `allowed_values`.
    pub fn require_claim_values<I, S>(
        &mut self,
        claim_type: impl Into<String>,
        allowed_values: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        // Builder calls chain, so invalid input is reported by `build`.
        match Requirement::claim(claim_type, allowed_values) {
            Ok(requirement) => self.add_requirement(requirement),
            Err(err) => {
                self.errors.push(err);
                self
            }
        }
    }

    pub fn build(self) -> Result<Policy, AuthzError> {
        let name = self.name;
        if let Some(err) = self.errors.into_iter().next() {
            return Err(match err {
                AuthzError::InvalidArgument(msg) => {
                    AuthzError::InvalidArgument(format!("policy '{name}': {msg}"))
                }
                other => other,
            });
        }
        if self.requirements.is_empty() {
            return Err(AuthzError::invalid_argument(format!(
                "policy '{name}': a policy needs at least one requirement"
            )));
        }
        Ok(Policy {
            name,
            requirements: self.requirements,
        })
    }
}
