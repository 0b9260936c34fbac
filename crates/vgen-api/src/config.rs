//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

/// OAuth client credentials for one social sign-in provider.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthCredentials {
    fn from_env(id_var: &str, secret_var: &str) -> Option<Self> {
        let client_id = std::env::var(id_var).ok().filter(|s| !s.is_empty())?;
        let client_secret = std::env::var(secret_var).ok().filter(|s| !s.is_empty())?;
        Some(Self {
            client_id,
            client_secret,
        })
    }
}

/// Session and sign-in configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret used to sign session cookies
    pub secret: Option<String>,
    /// Session lifetime
    pub session_ttl: Duration,
    /// Google sign-in credentials
    pub google: Option<OAuthCredentials>,
    /// GitHub sign-in credentials
    pub github: Option<OAuthCredentials>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            session_ttl: Duration::from_secs(30 * 24 * 3600), // 30 days
            google: None,
            github: None,
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Public base URL, used for OAuth redirect URIs
    pub public_url: String,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Optional JSON file replacing the built-in provider catalog
    pub provider_catalog_path: Option<PathBuf>,
    /// Expose Prometheus metrics at /metrics
    pub metrics_enabled: bool,
    pub auth: AuthConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            public_url: "http://localhost:8000".to_string(),
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 20 * 1024 * 1024, // 20MB, reference images
            environment: "development".to_string(),
            provider_catalog_path: None,
            metrics_enabled: true,
            auth: AuthConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            public_url: std::env::var("PUBLIC_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_url),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            provider_catalog_path: std::env::var("PROVIDER_CATALOG_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            auth: AuthConfig {
                secret: std::env::var("AUTH_SECRET").ok().filter(|s| !s.is_empty()),
                session_ttl: std::env::var("SESSION_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.auth.session_ttl),
                google: OAuthCredentials::from_env("AUTH_GOOGLE_ID", "AUTH_GOOGLE_SECRET"),
                github: OAuthCredentials::from_env("AUTH_GITHUB_ID", "AUTH_GITHUB_SECRET"),
            },
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert!(!config.is_production());
        assert_eq!(config.auth.session_ttl, Duration::from_secs(2_592_000));
        assert!(config.auth.google.is_none());
    }

    #[test]
    fn test_is_production_case_insensitive() {
        let config = ApiConfig {
            environment: "Production".to_string(),
            ..Default::default()
        };
        assert!(config.is_production());
    }
}
