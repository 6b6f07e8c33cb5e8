//! Verified identity/claims bundle handed to requirements and handlers.
//!
//! A principal is built once per request and never mutated afterwards.
//! An empty principal (no identities) means "unauthenticated".
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Authentication type recorded on identities built from bearer tokens.
pub const BEARER_AUTHENTICATION_TYPE: &str = "Bearer";

/// One authenticated identity: claim type -> ordered claim values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Identity {
    authentication_type: Option<String>,
    claims: BTreeMap<String, Vec<String>>,
}

impl Identity {
    pub fn new(authentication_type: impl Into<String>) -> Self {
        Self {
            authentication_type: Some(authentication_type.into()),
            claims: BTreeMap::new(),
        }
    }

    pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims
            .entry(claim_type.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Build an identity from a decoded JWT claim set.
    ///
    /// Strings are kept as-is, arrays expand to one value per element,
    /// everything else is stored as its compact JSON text.
    pub fn from_jwt_claims<I>(claims: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut identity = Self::new(BEARER_AUTHENTICATION_TYPE);
        for (claim_type, value) in claims {
            let values = identity.claims.entry(claim_type).or_default();
            match value {
                Value::Array(items) => values.extend(items.into_iter().filter_map(claim_text)),
                other => values.extend(claim_text(other)),
            }
        }
        identity.claims.retain(|_, values| !values.is_empty());
        identity
    }

    pub fn authentication_type(&self) -> Option<&str> {
        self.authentication_type.as_deref()
    }

    /// All `(claim type, value)` pairs.
    pub fn claims(&self) -> impl Iterator<Item = (&str, &str)> {
        self.claims
            .iter()
            .flat_map(|(t, values)| values.iter().map(move |v| (t.as_str(), v.as_str())))
    }

    /// Values of `claim_type`, matched ASCII case-insensitively.
    pub fn values_of<'a>(&'a self, claim_type: &str) -> impl Iterator<Item = &'a str> {
        self.claims
            .iter()
            .filter(move |(t, _)| t.eq_ignore_ascii_case(claim_type))
            .flat_map(|(_, values)| values.iter().map(String::as_str))
    }
}

fn claim_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Principal {
    identities: Vec<Identity>,
}

impl Principal {
    /// Principal without any identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn is_authenticated(&self) -> bool {
        !self.identities.is_empty()
    }

    /// All claims across every identity.
    pub fn claims(&self) -> impl Iterator<Item = (&str, &str)> {
        self.identities.iter().flat_map(|identity| identity.claims())
    }

    pub fn values_of<'a>(&'a self, claim_type: &str) -> impl Iterator<Item = &'a str> {
        self.identities
            .iter()
            .flat_map(move |identity| identity.values_of(claim_type))
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&str> {
        self.values_of(claim_type).next()
    }

    pub fn has_claim(&self, claim_type: &str) -> bool {
        self.find_first(claim_type).is_some()
    }

    /// Value of the `sub` claim.
    pub fn subject(&self) -> Option<&str> {
        self.find_first("sub")
    }
}
