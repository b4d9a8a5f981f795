//! Database migration command.
//!
//! Applies the migrations embedded in the storefront crate
//! (`crates/storefront/migrations/`). Already-applied migrations are skipped.

use super::{CommandError, connect};

/// Run database migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database cannot be reached or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let (_, pool) = connect().await?;
    tracing::info!("Migrations complete!");
    pool.close().await;
    Ok(())
}
