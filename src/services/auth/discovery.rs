//! Issuer trust resolution from OpenID Connect discovery endpoints.
//!
//! Each configured endpoint yields one trust anchor (issuer + signing keys).
//! Anchors are cached per endpoint and reloaded once older than the TTL.
//! A reload builds a fresh anchor and swaps it in, so concurrent readers only
//! ever see a complete anchor. When a reload fails the previous anchor keeps
//! being served (and the failure is logged).
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, PublicKeyUse};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::services::authz::error::{AuthnFailure, AuthzError};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid discovery document: {0}")]
    InvalidDocument(String),
}

/// A verification key published by an issuer.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: Option<String>,
    pub key: DecodingKey,
}

/// Resolved (issuer, signing keys) pair for one discovery endpoint.
#[derive(Clone)]
pub struct TrustAnchor {
    pub issuer: String,
    pub keys: Vec<SigningKey>,
}

impl std::fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        let kids: Vec<_> = self.keys.iter().map(|k| k.kid.as_deref()).collect();
        f.debug_struct("TrustAnchor")
            .field("issuer", &self.issuer)
            .field("kids", &kids)
            .finish()
    }
}

impl TrustAnchor {
    /// Build an anchor from raw JWKS entries.
    ///
    /// Encryption keys, symmetric (`oct`) keys and entries that cannot be turned
    /// into a verification key are skipped one by one.
    pub fn from_jwks(issuer: impl Into<String>, jwks: &[serde_json::Value]) -> Self {
        let issuer = issuer.into();
        let mut keys = Vec::with_capacity(jwks.len());

        for raw in jwks {
            let jwk: Jwk = match serde_json::from_value(raw.clone()) {
                Ok(jwk) => jwk,
                Err(e) => {
                    debug!(issuer = %issuer, error = %e, "skipping unsupported jwk");
                    continue;
                }
            };
            if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
                continue;
            }
            // a shared secret published in a key set is not a trust anchor
            if matches!(jwk.algorithm, AlgorithmParameters::OctetKey(_)) {
                debug!(issuer = %issuer, kid = ?jwk.common.key_id, "skipping symmetric jwk");
                continue;
            }
            match DecodingKey::from_jwk(&jwk) {
                Ok(key) => keys.push(SigningKey {
                    kid: jwk.common.key_id.clone(),
                    key,
                }),
                Err(e) => {
                    debug!(issuer = %issuer, error = %e, "skipping unusable jwk");
                }
            }
        }

        Self { issuer, keys }
    }

    /// Keys worth trying for a token carrying `kid`.
    pub fn candidate_keys<'a>(&'a self, kid: Option<&'a str>) -> impl Iterator<Item = &'a DecodingKey> {
        self.keys
            .iter()
            .filter(move |k| match (kid, k.kid.as_deref()) {
                (Some(wanted), Some(have)) => wanted == have,
                _ => true,
            })
            .map(|k| &k.key)
    }
}

/// Loads the trust anchor published at a discovery endpoint.
#[async_trait]
pub trait DiscoveryFetcher: Send + Sync {
    async fn fetch(&self, endpoint: &str) -> Result<TrustAnchor, DiscoveryError>;
}

#[derive(Debug, Deserialize)]
struct OpenIdConfiguration {
    issuer: String,
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct JwkSetDocument {
    #[serde(default)]
    keys: Vec<serde_json::Value>,
}

/// Fetches `issuer` and `jwks_uri` from the discovery document, then the key set.
///
/// Timeouts come from the `reqwest::Client` configuration.
#[derive(Debug, Clone)]
pub struct HttpDiscoveryFetcher {
    client: reqwest::Client,
}

impl HttpDiscoveryFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl DiscoveryFetcher for HttpDiscoveryFetcher {
    async fn fetch(&self, endpoint: &str) -> Result<TrustAnchor, DiscoveryError> {
        let config: OpenIdConfiguration = self
            .client
            .get(endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if config.issuer.trim().is_empty() {
            return Err(DiscoveryError::InvalidDocument("empty issuer".into()));
        }
        if config.jwks_uri.trim().is_empty() {
            return Err(DiscoveryError::InvalidDocument("empty jwks_uri".into()));
        }

        let jwks: JwkSetDocument = self
            .client
            .get(&config.jwks_uri)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(TrustAnchor::from_jwks(config.issuer, &jwks.keys))
    }
}

struct CachedAnchor {
    anchor: Arc<TrustAnchor>,
    fetched_at: Instant,
}

struct EndpointSlot {
    endpoint: String,
    cached: ArcSwapOption<CachedAnchor>,
}

/// Process-wide trust set built from the configured discovery endpoints.
pub struct TrustResolver {
    slots: Vec<EndpointSlot>,
    fetcher: Arc<dyn DiscoveryFetcher>,
    ttl: Duration,
}

impl std::fmt::Debug for TrustResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endpoints: Vec<_> = self.slots.iter().map(|s| s.endpoint.as_str()).collect();
        f.debug_struct("TrustResolver")
            .field("endpoints", &endpoints)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TrustResolver {
    pub fn new(
        endpoints: Vec<String>,
        fetcher: Arc<dyn DiscoveryFetcher>,
        ttl: Duration,
    ) -> Result<Self, AuthzError> {
        if endpoints.is_empty() {
            return Err(AuthzError::invalid_argument(
                "at least one discovery endpoint is required",
            ));
        }
        if endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(AuthzError::invalid_argument(
                "discovery endpoints must not be blank",
            ));
        }

        let slots = endpoints
            .into_iter()
            .map(|endpoint| EndpointSlot {
                endpoint,
                cached: ArcSwapOption::empty(),
            })
            .collect();

        Ok(Self {
            slots,
            fetcher,
            ttl,
        })
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.endpoint.as_str())
    }

    /// Anchors of every endpoint that could be resolved, in configuration order.
    ///
    /// Fails only when no endpoint resolves.
    pub async fn anchors(&self) -> Result<Vec<Arc<TrustAnchor>>, AuthzError> {
        let mut anchors = Vec::with_capacity(self.slots.len());
        let mut last_error = None;

        for slot in &self.slots {
            match self.resolve(slot, false).await {
                Ok(anchor) => anchors.push(anchor),
                Err(e) => last_error = Some(e),
            }
        }

        if anchors.is_empty() {
            return Err(match last_error {
                Some(e) => AuthzError::unauthenticated_with(AuthnFailure::NoTrustAnchors, e),
                None => AuthzError::unauthenticated(AuthnFailure::NoTrustAnchors),
            });
        }
        Ok(anchors)
    }

    /// Reload every endpoint regardless of age. Returns how many were refreshed.
    pub async fn refresh(&self) -> usize {
        let mut refreshed = 0;
        for slot in &self.slots {
            if self.resolve(slot, true).await.is_ok() {
                refreshed += 1;
            }
        }
        refreshed
    }

    async fn resolve(
        &self,
        slot: &EndpointSlot,
        force: bool,
    ) -> Result<Arc<TrustAnchor>, DiscoveryError> {
        let cached = slot.cached.load_full();
        if let Some(cached) = cached.as_ref() {
            if !force && cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.anchor.clone());
            }
        }

        match self.fetcher.fetch(&slot.endpoint).await {
            Ok(anchor) => {
                debug!(
                    endpoint = %slot.endpoint,
                    issuer = %anchor.issuer,
                    keys = anchor.keys.len(),
                    "trust anchor refreshed"
                );
                let anchor = Arc::new(anchor);
                slot.cached.store(Some(Arc::new(CachedAnchor {
                    anchor: anchor.clone(),
                    fetched_at: Instant::now(),
                })));
                Ok(anchor)
            }
            Err(e) => match cached {
                Some(stale) => {
                    warn!(
                        endpoint = %slot.endpoint,
                        error = %e,
                        "discovery refresh failed, using stale trust anchor"
                    );
                    Ok(stale.anchor.clone())
                }
                None => {
                    warn!(endpoint = %slot.endpoint, error = %e, "discovery endpoint could not be resolved");
                    Err(e)
                }
            },
        }
    }
}
