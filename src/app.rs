/*
 * Responsibility
 * - Config loading -> dependency construction -> Router assembly
 * - Policy registration (the only place the registry is mutated)
 * - Middleware application (gate + HTTP layers)
 * - axum::serve()
 */
use std::{panic, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::{AppEnv, Config};
use crate::middleware;
use crate::services::auth::{HttpDiscoveryFetcher, JwtPrincipalBuilder, TrustResolver};
use crate::services::authz::{
    AuthorizationEngine, AuthzError, EndpointPolicies, PolicyRegistry,
};
use crate::state::AppState;

fn init_tracing(app_env: AppEnv) {
    // RUST_LOG wins when set, e.g.
    // RUST_LOG=info,policy_gate=debug,tower_http=debug cargo run
    let default_filter = if app_env.is_production() {
        "info,tower_http=info"
    } else {
        "info,policy_gate=debug,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Route panics through tracing, then the default hook.
///
/// The hook runs before unwinding; it must return so that `CatchPanicLayer`
/// can still answer the request with a 500.
pub fn init_panic_hook() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");
        default_hook(info);
    }))
}

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(AppEnv::from_env());
    init_panic_hook();

    let config = Config::from_env()?;

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Policies known to this service.
pub fn build_policies() -> Result<PolicyRegistry, AuthzError> {
    let mut policies = PolicyRegistry::new();

    policies.add_policy("Admin", |p| {
        p.require_authenticated_user()
            .require_claim_values("roles", ["admin"]);
    })?;

    policies.add_policy("Auditor", |p| {
        p.require_authenticated_user()
            .require_claim_values("roles", ["auditor"]);
    })?;

    Ok(policies)
}

pub fn build_endpoints(policies: &PolicyRegistry) -> Result<EndpointPolicies, AuthzError> {
    let endpoints = api::v1::endpoint_policies();
    endpoints.validate(policies)?;
    Ok(endpoints)
}

async fn build_state(config: &Config) -> Result<AppState> {
    let policies = build_policies().context("invalid policy configuration")?;
    let endpoints = build_endpoints(&policies).context("invalid endpoint configuration")?;

    let fetcher = HttpDiscoveryFetcher::with_timeout(config.discovery_timeout)
        .context("failed to build discovery http client")?;
    let trust = Arc::new(
        TrustResolver::new(
            config.discovery_endpoints.clone(),
            Arc::new(fetcher),
            config.discovery_ttl,
        )
        .context("invalid discovery configuration")?,
    );

    // Warm the cache; unreachable issuers are retried on first use.
    let ready = trust.refresh().await;
    tracing::info!(
        resolved = ready,
        configured = config.discovery_endpoints.len(),
        "trust anchors loaded"
    );

    let principals = JwtPrincipalBuilder::new(trust, config.clock_skew_seconds);
    let engine = AuthorizationEngine::new(
        Arc::new(policies),
        Arc::new(endpoints),
        Arc::new(principals),
    );

    Ok(AppState::new(Arc::new(engine)))
}

pub fn build_router(state: AppState) -> Router {
    let router = Router::new().nest(api::v1::PREFIX, api::v1::routes());
    let router = middleware::authz::apply(router, state.clone()).with_state(state);

    middleware::http::apply(router)
}
