//! Environment-driven configuration
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file by the binaries (`dotenvy::dotenv().ok()`).

use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "postgresql://localhost:5432/ecfr";

/// Default number of search results when the request gives no `limit`
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Hard ceiling on search results regardless of `limit`
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            max_connections: env_parse("DATABASE_POOL_SIZE").unwrap_or(10),
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)), // 10 minutes
            max_lifetime: Some(Duration::from_secs(1800)), // 30 minutes
        }
    }
}

impl DatabaseConfig {
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub search_limit: usize,
    pub cors_any: bool,
    pub database: DatabaseConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            search_limit: DEFAULT_SEARCH_LIMIT,
            cors_any: true,
            database: DatabaseConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("ECFR_BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: env_parse("PORT").unwrap_or(defaults.port),
            search_limit: env_parse::<usize>("ECFR_SEARCH_LIMIT")
                .map(|limit| limit.clamp(1, MAX_SEARCH_LIMIT))
                .unwrap_or(defaults.search_limit),
            cors_any: env_parse("ECFR_CORS_ANY").unwrap_or(defaults.cors_any),
            database: defaults.database,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Mask the password portion of a database URL before logging it
pub fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.password().is_some() => {
            let mut masked = parsed.clone();
            let _ = masked.set_password(Some("***"));
            masked.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        // If URL parsing fails, just mask the middle part
        Err(_) => {
            let chars: Vec<char> = url.chars().collect();
            if chars.len() <= 20 {
                return "***".to_string();
            }
            let head: String = chars[..10].iter().collect();
            let tail: String = chars[chars.len() - 10..].iter().collect();
            format!("{}***{}", head, tail)
        }
    }
}
