use gatekey_core::key_service::KeyConfig;
use ipnetwork::IpNetwork;
use gatekey_core::session::SessionConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long in-flight requests may drain after a shutdown signal
    /// (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JSON network table for geo lookups. Without it no request can be
    /// fingerprinted and origin verification is skipped.
    pub geo_table_path: Option<String>,
    /// Reverse proxies whose `X-Forwarded-For` is believed when enforcing
    /// API key access policies. Empty means only the socket peer counts.
    pub trusted_proxies: Vec<IpNetwork>,
    /// Access/refresh token lifetimes and password policy.
    pub session: SessionConfig,
    /// Per-account API key quota.
    pub keys: KeyConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    /// | `GEO_TABLE_PATH`       | unset                      |
    /// | `TRUSTED_PROXIES`      | empty (comma-separated CIDRs) |
    ///
    /// Session and key settings are read by [`SessionConfig::from_env`] and
    /// [`KeyConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let geo_table_path = std::env::var("GEO_TABLE_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty());

        let trusted_proxies: Vec<IpNetwork> = std::env::var("TRUSTED_PROXIES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse()
                    .expect("TRUSTED_PROXIES must be comma-separated CIDR ranges")
            })
            .collect();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            geo_table_path,
            trusted_proxies,
            session: SessionConfig::from_env(),
            keys: KeyConfig::from_env(),
        }
    }
}
