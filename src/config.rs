/*
 * Responsibility
 * - Load settings from the environment (.env is honoured via dotenvy)
 * - Validate them up front: missing or invalid values abort startup
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()))
    }

    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    /// OpenID Connect discovery documents, in trust order.
    pub discovery_endpoints: Vec<String>,
    pub discovery_ttl: Duration,
    pub discovery_timeout: Duration,

    /// Leeway applied to `exp` / `nbf`.
    pub clock_skew_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let discovery_endpoints = parse_endpoints(
            &std::env::var("AUTH_DISCOVERY_ENDPOINTS")
                .map_err(|_| ConfigError::Missing("AUTH_DISCOVERY_ENDPOINTS"))?,
        )?;

        let discovery_ttl = Duration::from_secs(seconds("AUTH_DISCOVERY_TTL_SECONDS", 43_200)?); // 12h
        let discovery_timeout = Duration::from_secs(seconds("AUTH_DISCOVERY_TIMEOUT_SECONDS", 10)?);
        let clock_skew_seconds = seconds("AUTH_CLOCK_SKEW_SECONDS", 300)?;

        Ok(Self {
            addr,
            app_env,
            discovery_endpoints,
            discovery_ttl,
            discovery_timeout,
            clock_skew_seconds,
        })
    }
}

fn seconds(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Comma-separated list of absolute http(s) URLs.
fn parse_endpoints(raw: &str) -> Result<Vec<String>, ConfigError> {
    let endpoints = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match Url::parse(s) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(s.to_string()),
            _ => Err(ConfigError::Invalid("AUTH_DISCOVERY_ENDPOINTS")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if endpoints.is_empty() {
        return Err(ConfigError::Missing("AUTH_DISCOVERY_ENDPOINTS"));
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_split_and_trimmed() {
        let endpoints = parse_endpoints(
            " https://a.example/.well-known/openid-configuration ,,http://b.example/oidc ",
        )
        .unwrap();
        assert_eq!(
            endpoints,
            vec![
                "https://a.example/.well-known/openid-configuration",
                "http://b.example/oidc"
            ]
        );
    }

    #[test]
    fn endpoints_must_be_http_urls() {
        assert!(matches!(
            parse_endpoints("ftp://a.example/x"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_endpoints("not a url"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(parse_endpoints(" , "), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn app_env_accepts_short_production_name() {
        assert!(AppEnv::parse("PROD").is_production());
        assert!(!AppEnv::parse("staging").is_production());
    }
}
