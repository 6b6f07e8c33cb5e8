//! Policy name -> Policy mapping.
//!
//! Mutated only while the application is being configured; afterwards it is
//! shared behind an `Arc` and only read.
use std::collections::HashMap;
use std::sync::Arc;

use crate::services::authz::error::AuthzError;
use crate::services::authz::policy::{Policy, PolicyBuilder};
use crate::services::authz::requirement::Requirement;

/// Name of the built-in policy; it only requires an authenticated user.
pub const DEFAULT_POLICY: &str = "AuthenticatedUser";

#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    // keyed by ASCII-lower-cased policy name
    policies: HashMap<String, Arc<Policy>>,
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyRegistry {
    /// Registry seeded with [`DEFAULT_POLICY`].
    pub fn new() -> Self {
        let mut policies = HashMap::new();
        policies.insert(normalize(DEFAULT_POLICY), Arc::new(default_policy()));
        Self { policies }
    }

    /// Build a policy with `configure` and store it under `name`, replacing any
    /// policy already registered under the same (case-insensitive) name.
    pub fn add_policy<F>(&mut self, name: &str, configure: F) -> Result<(), AuthzError>
    where
        F: FnOnce(&mut PolicyBuilder),
    {
        if name.trim().is_empty() {
            return Err(AuthzError::invalid_argument("policy name must not be blank"));
        }

        let mut builder = Policy::builder(name);
        configure(&mut builder);
        let policy = builder.build()?;

        if self
            .policies
            .insert(normalize(name), Arc::new(policy))
            .is_some()
        {
            tracing::debug!(policy = name, "policy replaced");
        }
        Ok(())
    }

    /// A blank name is reported the same way as an unknown one.
    pub fn get_policy(&self, name: &str) -> Result<Arc<Policy>, AuthzError> {
        if name.trim().is_empty() {
            return Err(AuthzError::PolicyNotFound(name.to_string()));
        }

        self.policies
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| AuthzError::PolicyNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

fn default_policy() -> Policy {
    Policy::single(DEFAULT_POLICY, Requirement::AuthenticatedUser)
}

// Same folding as endpoint policy lists and claim types.
fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::authz::principal::{Identity, Principal};

    #[tokio::test]
    async fn default_policy_is_seeded() {
        let registry = PolicyRegistry::new();
        let policy = registry.get_policy(DEFAULT_POLICY).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(!policy.evaluate(&Principal::anonymous()).await.unwrap());
        let user = Principal::new(vec![Identity::new("test")]);
        assert!(policy.evaluate(&user).await.unwrap());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut registry = PolicyRegistry::new();
        registry
            .add_policy("Admin", |p| {
                p.require_claim_values("roles", ["admin"]);
            })
            .unwrap();

        let a = registry.get_policy("Admin").unwrap();
        let b = registry.get_policy("admin").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.name(), "Admin");
    }

    #[test]
    fn non_ascii_names_are_not_folded() {
        let mut registry = PolicyRegistry::new();
        registry
            .add_policy("Ärzte", |p| {
                p.require_claim("department");
            })
            .unwrap();

        assert!(!registry.contains("äRZTE"));
        assert!(registry.contains("ÄRZTE"));
    }

    #[test]
    fn unknown_policy_is_not_found() {
        let registry = PolicyRegistry::new();
        assert!(matches!(
            registry.get_policy("nonexistent"),
            Err(AuthzError::PolicyNotFound(name)) if name == "nonexistent"
        ));
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut registry = PolicyRegistry::new();
        assert!(matches!(
            registry.add_policy("", |p| {
                p.require_authenticated_user();
            }),
            Err(AuthzError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.get_policy(" "),
            Err(AuthzError::PolicyNotFound(_))
        ));
    }

    #[test]
    fn re_adding_overwrites() {
        let mut registry = PolicyRegistry::new();
        registry
            .add_policy("Reader", |p| {
                p.require_claim("scope");
            })
            .unwrap();
        registry
            .add_policy("READER", |p| {
                p.require_claim("scope").require_claim("sub");
            })
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get_policy("reader").unwrap().requirements().len(), 2);
    }

    #[test]
    fn policy_without_requirements_is_rejected() {
        let mut registry = PolicyRegistry::new();
        let err = registry.add_policy("Empty", |_| {}).unwrap_err();
        assert!(err.to_string().contains("Empty"));
        assert!(!registry.contains("Empty"));
    }
}
