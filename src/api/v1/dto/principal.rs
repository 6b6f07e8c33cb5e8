use serde::Serialize;

use crate::services::authz::Principal;

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct PrincipalResponse {
    pub authenticated: bool,
    pub subject: Option<String>,
    pub claims: Vec<ClaimResponse>,
}

impl From<&Principal> for PrincipalResponse {
    fn from(p: &Principal) -> Self {
        Self {
            authenticated: p.is_authenticated(),
            subject: p.subject().map(str::to_string),
            claims: p
                .claims()
                .map(|(t, v)| ClaimResponse {
                    claim_type: t.to_string(),
                    value: v.to_string(),
                })
                .collect(),
        }
    }
}
