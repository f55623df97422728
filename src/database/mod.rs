//! Database connection and management module
//!
//! Connection pooling for the Postgres corpus plus the sqlx-backed
//! implementation of `RegulationStore`.

use sqlx::Row;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

pub mod regulation_store;

pub use regulation_store::PgRegulationStore;

pub use crate::config::DatabaseConfig;
use crate::config::mask_database_url;

/// Tables every endpoint depends on
const REQUIRED_TABLES: [&str; 5] = [
    "nodes",
    "content_chunks",
    "agencies",
    "agency_node_mappings",
    "corrections",
];

/// Database connection manager
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    /// Create a new database manager with the given configuration
    pub async fn new(config: DatabaseConfig) -> Result<Self, sqlx::Error> {
        info!(
            "Connecting to database: {}",
            mask_database_url(&config.database_url)
        );

        let mut pool_options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connection_timeout);

        if let Some(idle_timeout) = config.idle_timeout {
            pool_options = pool_options.idle_timeout(idle_timeout);
        }

        if let Some(max_lifetime) = config.max_lifetime {
            pool_options = pool_options.max_lifetime(max_lifetime);
        }

        let pool = pool_options
            .connect(&config.database_url)
            .await
            .map_err(|e| {
                warn!("Failed to connect to database: {}", e);
                e
            })?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    /// Create a new database manager with default configuration
    pub async fn with_default_config() -> Result<Self, sqlx::Error> {
        Self::new(DatabaseConfig::default()).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Store over this connection pool
    pub fn regulation_store(&self) -> PgRegulationStore {
        PgRegulationStore::new(self.pool.clone())
    }

    /// Test database connectivity
    pub async fn test_connection(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
    }

    /// Names of required tables missing from the connected database
    pub async fn missing_tables(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = current_schema()
              AND table_name::text = ANY($1)
            "#,
        )
        .bind(REQUIRED_TABLES.iter().map(|t| t.to_string()).collect::<Vec<_>>())
        .fetch_all(&self.pool)
        .await?;

        let present: Vec<String> = rows
            .iter()
            .map(|row| row.get::<String, _>("table_name"))
            .collect();

        let missing: Vec<String> = REQUIRED_TABLES
            .iter()
            .filter(|t| !present.iter().any(|p| p == *t))
            .map(|t| t.to_string())
            .collect();

        if missing.is_empty() {
            info!("Database schema verification complete");
        } else {
            warn!(?missing, "Expected corpus tables not found");
        }
        Ok(missing)
    }

    /// Get database connection statistics
    pub fn connection_stats(&self) -> ConnectionStats {
        ConnectionStats {
            size: self.pool.size(),
            num_idle: self.pool.num_idle() as u32,
        }
    }

    /// Close the database connection pool
    pub async fn close(self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }
}

/// Database connection statistics
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub size: u32,
    pub num_idle: u32,
}

impl std::fmt::Display for ConnectionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pool size: {}, Idle: {}", self.size, self.num_idle)
    }
}
