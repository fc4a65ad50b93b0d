/// Configuration management for the projectflow server
///
/// Handles server binding, database connection and authentication parameters.
/// Every value can be overridden from the environment for container deployment.

/// Signing secret used outside production when `AUTH_SECRET` is unset
const DEV_AUTH_SECRET: &str = "projectflow-dev-secret-change-me";

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Authentication and session configuration
    pub auth: AuthConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Relational store configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection string (e.g., "sqlite://data/projectflow.db")
    pub url: String,
}

/// Token signing and cookie settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for signing access tokens
    pub secret: String,
    /// True when `APP_ENV=production`; turns on the `Secure` cookie attribute
    pub production: bool,
    /// Lifetime of a regular login token, in seconds
    pub token_ttl_secs: i64,
    /// Lifetime of a "remember me" session token, in seconds
    pub session_max_age_secs: i64,
    /// Maximum age of a token's issue time before the gate forces a new login
    pub inactivity_timeout_secs: i64,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        let production = std::env::var("APP_ENV")
            .map(|env| env.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Self {
            server: ServerConfig {
                host: std::env::var("PROJECTFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("PROJECTFLOW_PORT", 3004),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/projectflow.db".to_string()),
            },
            auth: AuthConfig {
                secret: std::env::var("AUTH_SECRET").unwrap_or_default(),
                production,
                token_ttl_secs: env_or("TOKEN_TTL_SECS", 24 * 60 * 60),
                session_max_age_secs: env_or("SESSION_MAX_AGE_SECS", 30 * 24 * 60 * 60),
                inactivity_timeout_secs: env_or("SESSION_INACTIVITY_TIMEOUT_SECS", 24 * 60 * 60),
            },
        }
    }
}

impl Config {
    /// Check the loaded configuration and fill in development fallbacks
    ///
    /// A missing signing secret is fatal in production. Elsewhere a fixed
    /// development secret is used and a warning is logged.
    pub fn validate(mut self) -> anyhow::Result<Self> {
        if self.auth.secret.is_empty() {
            if self.auth.production {
                anyhow::bail!("AUTH_SECRET must be set when APP_ENV=production");
            }
            tracing::warn!("AUTH_SECRET not set, using the development signing secret");
            self.auth.secret = DEV_AUTH_SECRET.to_string();
        }

        if self.auth.token_ttl_secs <= 0 || self.auth.session_max_age_secs <= 0 {
            anyhow::bail!("token lifetimes must be positive");
        }
        if self.auth.inactivity_timeout_secs <= 0 {
            anyhow::bail!("SESSION_INACTIVITY_TIMEOUT_SECS must be positive");
        }

        Ok(self)
    }
}

/// Read and parse an environment variable, falling back on absence or parse failure
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
