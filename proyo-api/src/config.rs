//! API Configuration Module
//!
//! Listener, CORS, query timeout and webhook settings. Configuration is
//! loaded from environment variables with defaults suited to development.

use proyo_core::DEFAULT_QUERY_TIMEOUT_MS;
use std::net::SocketAddr;
use uuid::Uuid;

/// Well-known id of the webhook forwarding into the command gateway.
pub const DEFAULT_GATEWAY_WEBHOOK_ID: Uuid = uuid::uuid!("5d4dbdb7-c22c-43bd-bda4-5017b5e95264");

const DEFAULT_PORT: u16 = 3927;

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Interface the listener binds to.
    pub bind_host: String,

    pub port: u16,

    /// Externally reachable base URL used to build webhook URLs.
    /// Example: "https://gateway.proyo.io"
    pub public_base_url: String,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins.
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Gateway
    // ========================================================================
    /// Deployment environment; "production" hides error causes.
    pub environment: String,

    /// Timeout applied to every store query.
    pub query_timeout_ms: u64,

    /// Id under which the gateway webhook is pre-registered.
    pub gateway_webhook_id: Uuid,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            public_base_url: format!("http://localhost:{}", DEFAULT_PORT),
            cors_origins: Vec::new(), // Empty = allow all
            cors_allow_credentials: false,
            cors_max_age_secs: 86400, // 24 hours
            environment: "development".to_string(),
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            gateway_webhook_id: DEFAULT_GATEWAY_WEBHOOK_ID,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PROYO_API_BIND`: Listener host (default: 0.0.0.0)
    /// - `PORT` or `PROYO_API_PORT`: Listener port (default: 3927)
    /// - `PROYO_PUBLIC_BASE_URL`: Base for webhook URLs (default: http://localhost:{port})
    /// - `PROYO_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `PROYO_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `PROYO_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `PROYO_ENVIRONMENT`: Deployment environment (default: development)
    /// - `PROYO_QUERY_TIMEOUT_MS`: Per-query timeout (default: 5000)
    /// - `PROYO_GATEWAY_WEBHOOK_ID`: Gateway webhook UUID
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_host = std::env::var("PROYO_API_BIND").unwrap_or(defaults.bind_host);

        let port = std::env::var("PORT")
            .or_else(|_| std::env::var("PROYO_API_PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let public_base_url = std::env::var("PROYO_PUBLIC_BASE_URL")
            .ok()
            .map(|s| s.trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let cors_origins = std::env::var("PROYO_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("PROYO_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("PROYO_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let environment = std::env::var("PROYO_ENVIRONMENT")
            .map(|s| s.trim().to_lowercase())
            .unwrap_or(defaults.environment);

        let query_timeout_ms = std::env::var("PROYO_QUERY_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_QUERY_TIMEOUT_MS);

        let gateway_webhook_id = match std::env::var("PROYO_GATEWAY_WEBHOOK_ID") {
            Ok(raw) => Uuid::parse_str(raw.trim()).unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Ignoring invalid gateway webhook id");
                DEFAULT_GATEWAY_WEBHOOK_ID
            }),
            Err(_) => DEFAULT_GATEWAY_WEBHOOK_ID,
        };

        Self {
            bind_host,
            port,
            public_base_url,
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            environment,
            query_timeout_ms,
            gateway_webhook_id,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Whether error responses carry the underlying cause.
    pub fn expose_error_details(&self) -> bool {
        !self.is_production()
    }

    /// Listener address, falling back to all interfaces when the host
    /// does not parse.
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.bind_host, self.port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.port)))
    }

    /// Public URL of the webhook with `id`.
    pub fn webhook_url(&self, id: impl std::fmt::Display) -> String {
        format!("{}/webhook/{}", self.public_base_url, id)
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.proyo.io
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }
}
