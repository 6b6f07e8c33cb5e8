//! Which policies apply to which handler.
//!
//! Handlers are identified by an opaque key; the HTTP gate uses
//! `"<METHOD> <route path>"` (see [`endpoint_key`]).
use std::collections::HashMap;

use crate::services::authz::error::AuthzError;
use crate::services::authz::registry::{DEFAULT_POLICY, PolicyRegistry};

/// Maps a handler key to the ordered policy names declared for it.
///
/// Must be deterministic: the same key always yields the same names.
pub trait EndpointPolicyResolver: Send + Sync {
    /// Empty when the handler declares no policy.
    fn resolve(&self, endpoint: &str) -> Vec<String>;
}

/// Key used by the HTTP gate for a method + route path pair.
///
/// `HEAD` is answered by the route's `GET` handler, so both share one key.
pub fn endpoint_key(method: &str, path: &str) -> String {
    let method = method.to_ascii_uppercase();
    let method = match method.as_str() {
        "HEAD" => "GET",
        other => other,
    };
    format!("{method} {path}")
}

// Table keys: ASCII case-folded, HEAD folded onto GET.
fn table_key(endpoint: &str) -> String {
    let key = endpoint.trim().to_ascii_lowercase();
    match key.strip_prefix("head ") {
        Some(path) => format!("get {path}"),
        None => key,
    }
}

/// In-code registration table, built at startup.
#[derive(Debug, Clone, Default)]
pub struct EndpointPolicies {
    // keyed by `table_key`
    endpoints: HashMap<String, Vec<String>>,
}

impl EndpointPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `policy` on `endpoint`. Repeated declarations accumulate in order.
    pub fn authorize(mut self, endpoint: &str, policy: &str) -> Self {
        self.push(endpoint, policy);
        self
    }

    /// Declare the default policy on `endpoint`.
    pub fn authenticated(self, endpoint: &str) -> Self {
        self.authorize(endpoint, DEFAULT_POLICY)
    }

    /// Declare several policies on `endpoint`; any one of them grants access.
    pub fn authorize_any<I, S>(mut self, endpoint: &str, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for policy in policies {
            self.push(endpoint, policy.as_ref());
        }
        self
    }

    fn push(&mut self, endpoint: &str, policy: &str) {
        let names = self.endpoints.entry(table_key(endpoint)).or_default();
        if !names.iter().any(|n| n.eq_ignore_ascii_case(policy)) {
            names.push(policy.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Fail when an endpoint names a policy the registry does not know.
    pub fn validate(&self, registry: &PolicyRegistry) -> Result<(), AuthzError> {
        for (endpoint, names) in &self.endpoints {
            for name in names {
                if name.trim().is_empty() {
                    return Err(AuthzError::invalid_argument(format!(
                        "endpoint '{endpoint}' declares a blank policy name"
                    )));
                }
                if !registry.contains(name) {
                    return Err(AuthzError::invalid_argument(format!(
                        "endpoint '{endpoint}' declares unknown policy '{name}'"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl EndpointPolicyResolver for EndpointPolicies {
    fn resolve(&self, endpoint: &str) -> Vec<String> {
        self.endpoints
            .get(&table_key(endpoint))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_endpoint_has_no_policies() {
        let table = EndpointPolicies::new().authenticated("GET /me");
        assert!(table.resolve("GET /health").is_empty());
    }

    #[test]
    fn declarations_keep_their_order() {
        let table = EndpointPolicies::new()
            .authorize("GET /reports", "Admin")
            .authorize("GET /reports", "Auditor")
            .authorize("GET /reports", "admin");

        assert_eq!(table.resolve("GET /reports"), vec!["Admin", "Auditor"]);
    }

    #[test]
    fn endpoint_keys_ignore_case() {
        let table = EndpointPolicies::new().authorize_any("GET /Reports", ["Admin", "Auditor"]);
        assert_eq!(table.resolve("get /reports").len(), 2);
        assert_eq!(endpoint_key("get", "/reports"), "GET /reports");
    }

    #[test]
    fn head_resolves_like_get() {
        let table = EndpointPolicies::new().authorize("GET /admin", "Admin");

        assert_eq!(endpoint_key("HEAD", "/admin"), "GET /admin");
        assert_eq!(table.resolve(&endpoint_key("HEAD", "/admin")), vec!["Admin"]);
        assert_eq!(table.resolve("HEAD /admin"), vec!["Admin"]);
        assert!(table.resolve("POST /admin").is_empty());
    }

    #[test]
    fn policy_names_fold_ascii_case_only() {
        let table = EndpointPolicies::new()
            .authorize("GET /x", "Admin")
            .authorize("GET /x", "ADMIN")
            .authorize("GET /x", "Ärzte")
            .authorize("GET /x", "ärzte");

        assert_eq!(table.resolve("GET /x"), vec!["Admin", "Ärzte", "ärzte"]);
    }

    #[test]
    fn validation_rejects_unknown_policies() {
        let registry = PolicyRegistry::new();
        let table = EndpointPolicies::new()
            .authenticated("GET /me")
            .authorize("GET /admin", "Admin");

        let err = table.validate(&registry).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidArgument(msg) if msg.contains("Admin")));

        let ok = EndpointPolicies::new().authenticated("GET /me");
        assert!(ok.validate(&registry).is_ok());
    }
}
