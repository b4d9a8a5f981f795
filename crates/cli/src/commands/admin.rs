//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! # Ensure the bootstrap admin exists (password from BAZAAR_ADMIN_PASSWORD)
//! bazaar-cli admin bootstrap
//!
//! # Create a user directly
//! bazaar-cli user create -u alice -p secret123 [--admin]
//! ```

use thiserror::Error;

use bazaar_storefront::services::{AuthError, AuthService, BootstrapOutcome};

use super::{CommandError, connect};

/// Errors that can occur during account commands.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Setup failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Account operation failed.
    #[error("{0}")]
    Auth(#[from] AuthError),
}

/// Ensure the bootstrap `admin` account exists.
///
/// # Errors
///
/// Returns `AdminError` if the database fails or the configured password is too short.
pub async fn bootstrap() -> Result<(), AdminError> {
    let (config, pool) = connect().await?;

    match AuthService::new(&pool)
        .bootstrap_admin(&config.admin_password)
        .await?
    {
        BootstrapOutcome::Created => tracing::info!("Admin account created"),
        BootstrapOutcome::Promoted => {
            tracing::info!("Existing 'admin' account given the admin flag");
        }
        BootstrapOutcome::AlreadyPresent => tracing::info!("Admin account already present"),
    }

    pool.close().await;
    Ok(())
}

/// Create a new user.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `AdminError` if validation fails, the name is taken, or the database fails.
pub async fn create_user(
    username: &str,
    password: &str,
    is_admin: bool,
) -> Result<i64, AdminError> {
    let (_, pool) = connect().await?;

    tracing::info!("Creating user: {} (admin: {})", username, is_admin);
    let user = AuthService::new(&pool)
        .create_user(username, password, is_admin)
        .await?;
    tracing::info!("User created with ID: {}", user.id);

    pool.close().await;
    Ok(user.id.as_i64())
}
