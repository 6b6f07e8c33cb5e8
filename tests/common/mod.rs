#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, header};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use policy_gate::services::auth::discovery::DiscoveryError;
use policy_gate::services::auth::{
    DiscoveryFetcher, JwtPrincipalBuilder, TrustAnchor, TrustResolver,
};

/// One fake identity provider: discovery endpoint, issuer and ES256 key pair.
#[derive(Clone)]
pub struct Idp {
    pub endpoint: String,
    pub issuer: String,
    pub kid: String,
    signing_pem: String,
    public_jwk: Value,
}

/// PKCS#8 private key and public JWK of fixture key `n` (1..=4).
fn key_pair(n: usize) -> (String, Value) {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
    let pem = std::fs::read_to_string(format!("{dir}/es256-{n}.pem")).expect("fixture pem");
    let jwk = std::fs::read_to_string(format!("{dir}/es256-{n}.jwk.json")).expect("fixture jwk");
    (pem, serde_json::from_str(&jwk).expect("fixture jwk json"))
}

impl Idp {
    pub fn new(n: usize) -> Self {
        let (signing_pem, public_jwk) = key_pair(n);
        Self {
            endpoint: format!("https://idp-{n}.test/.well-known/openid-configuration"),
            issuer: format!("https://idp-{n}.test"),
            kid: format!("key-{n}"),
            signing_pem,
            public_jwk,
        }
    }

    /// Same issuer and kid, but signing with fixture key `n`.
    pub fn impostor(&self, n: usize) -> Self {
        let (signing_pem, public_jwk) = key_pair(n);
        Self {
            signing_pem,
            public_jwk,
            ..self.clone()
        }
    }

    pub fn jwk(&self) -> Value {
        let mut jwk = self.public_jwk.clone();
        jwk["kid"] = json!(self.kid);
        jwk["use"] = json!("sig");
        jwk["alg"] = json!("ES256");
        jwk
    }

    /// Token for `sub` valid for the next ten minutes.
    pub fn token(&self, sub: &str, roles: &[&str]) -> String {
        self.sign(self.claims(sub, roles))
    }

    pub fn claims(&self, sub: &str, roles: &[&str]) -> Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "iss": self.issuer,
            "sub": sub,
            "aud": "some-api",
            "roles": roles,
            "iat": now,
            "nbf": now,
            "exp": now + 600,
        })
    }

    pub fn sign(&self, claims: Value) -> String {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.kid.clone());
        let key = EncodingKey::from_ec_pem(self.signing_pem.as_bytes()).expect("ec signing key");
        jsonwebtoken::encode(&header, &claims, &key).expect("sign test token")
    }
}

/// Serves the anchors of the given providers from memory.
pub struct StaticFetcher {
    anchors: HashMap<String, (String, Vec<Value>)>,
}

impl StaticFetcher {
    pub fn new(idps: &[Idp]) -> Self {
        let anchors = idps
            .iter()
            .map(|idp| (idp.endpoint.clone(), (idp.issuer.clone(), vec![idp.jwk()])))
            .collect();
        Self { anchors }
    }

    /// Add `jwk` to the key set published by `idp`.
    pub fn publish(mut self, idp: &Idp, jwk: Value) -> Self {
        if let Some((_, keys)) = self.anchors.get_mut(&idp.endpoint) {
            keys.push(jwk);
        }
        self
    }
}

#[async_trait]
impl DiscoveryFetcher for StaticFetcher {
    async fn fetch(&self, endpoint: &str) -> Result<TrustAnchor, DiscoveryError> {
        let (issuer, keys) = self
            .anchors
            .get(endpoint)
            .ok_or_else(|| DiscoveryError::InvalidDocument(format!("{endpoint} unreachable")))?;
        Ok(TrustAnchor::from_jwks(issuer.clone(), keys))
    }
}

/// Builder configured with `endpoints`, of which only `reachable` answer.
pub fn principal_builder(endpoints: &[Idp], reachable: &[Idp]) -> JwtPrincipalBuilder {
    builder_with(endpoints, StaticFetcher::new(reachable))
}

pub fn builder_with(endpoints: &[Idp], fetcher: StaticFetcher) -> JwtPrincipalBuilder {
    let trust = TrustResolver::new(
        endpoints.iter().map(|i| i.endpoint.clone()).collect(),
        Arc::new(fetcher),
        Duration::from_secs(3600),
    )
    .expect("trust resolver");
    JwtPrincipalBuilder::new(Arc::new(trust), 0)
}

pub fn get(uri: &str, authorization: &[&str]) -> Request<Body> {
    request(Method::GET, uri, authorization)
}

pub fn request(method: Method, uri: &str, authorization: &[&str]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for value in authorization {
        builder = builder.header(header::AUTHORIZATION, *value);
    }
    builder.body(Body::empty()).expect("request")
}

pub async fn json_body(res: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
