use std::env;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{name} must be set when {required_by} is set")]
    Missing {
        name: &'static str,
        required_by: &'static str,
    },
}

/// HS256 secret used when `SESSION_SECRET` is unset. Only fit for local use.
pub const DEFAULT_SESSION_SECRET: &str = "dev-secret-change-me-in-production";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host to bind to.
    pub host: String,
    /// Server port to bind to.
    pub port: u16,
    /// PostgreSQL connection URL. Without one, documents live in memory.
    pub database_url: Option<String>,
    /// Maximum database connections in the pool.
    pub db_max_connections: u32,
    /// Minimum database connections in the pool.
    pub db_min_connections: u32,
    /// Clerk Backend API key. Without one, identities come from an in-memory directory.
    pub clerk_secret_key: Option<String>,
    pub clerk_api_url: String,
    /// PEM public key for RS256 session tokens.
    pub clerk_jwt_key: Option<String>,
    /// HS256 secret, used when no PEM key is configured.
    pub session_secret: String,
    /// `whsec_` secret for the identity webhook.
    pub webhook_secret: Option<String>,
    /// Plan that unlocks the agent dashboard.
    pub agent_plan: String,
    /// Allowed CORS origins; empty allows any.
    pub cors_origins: Vec<String>,
    /// Event bus channel capacity.
    pub event_bus_capacity: usize,
    /// Log level (e.g., "info", "debug", "trace").
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let text = |name: &str, default: &str| optional(name).unwrap_or_else(|| default.to_string());

        let config = Self {
            host: text("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", 3030)?,
            database_url: optional("DATABASE_URL"),
            db_max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", 20)?,
            db_min_connections: parse(&lookup, "DB_MIN_CONNECTIONS", 5)?,
            clerk_secret_key: optional("CLERK_SECRET_KEY"),
            clerk_api_url: text("CLERK_API_URL", "https://api.clerk.com/v1"),
            clerk_jwt_key: optional("CLERK_JWT_KEY"),
            session_secret: text("SESSION_SECRET", DEFAULT_SESSION_SECRET),
            webhook_secret: optional("CLERK_WEBHOOK_SECRET"),
            agent_plan: text("AGENT_PLAN", "agent"),
            cors_origins: optional("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            event_bus_capacity: parse(&lookup, "EVENT_BUS_CAPACITY", 1024)?,
            log_level: text("LOG_LEVEL", "info"),
        };

        // Real identities need tokens signed by the provider, not a shared secret.
        if config.clerk_secret_key.is_some() && config.clerk_jwt_key.is_none() {
            return Err(ConfigError::Missing {
                name: "CLERK_JWT_KEY",
                required_by: "CLERK_SECRET_KEY",
            });
        }
        Ok(config)
    }

    /// Whether sessions are checked against the built-in HS256 secret.
    pub fn uses_default_session_secret(&self) -> bool {
        self.clerk_jwt_key.is_none() && self.session_secret == DEFAULT_SESSION_SECRET
    }

    /// Build the socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
