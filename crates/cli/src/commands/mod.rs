//! Command implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use sqlx::SqlitePool;
use thiserror::Error;

use bazaar_storefront::config::{ConfigError, StorefrontConfig};
use bazaar_storefront::db;

/// Errors shared by every command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Environment could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Load configuration and open a pool with migrations applied.
pub async fn connect() -> Result<(StorefrontConfig, SqlitePool), CommandError> {
    let config = StorefrontConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    db::migrate(&pool).await?;

    Ok((config, pool))
}
