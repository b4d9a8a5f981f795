//! Authentication service.
//!
//! Provides password authentication backed by salted Argon2id hashes, plus the
//! account management used by the back-office and the admin bootstrap.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use tracing::{info, warn};

use bazaar_core::UserId;

use crate::config::DEFAULT_ADMIN_PASSWORD;
use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::user::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum username length.
const MAX_USERNAME_LENGTH: usize = 80;

/// Name of the account created by [`AuthService::bootstrap_admin`].
pub const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";

/// What the admin bootstrap did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The `admin` account was created.
    Created,
    /// An `admin` account existed without the admin flag; the flag was set.
    Promoted,
    /// Nothing to do.
    AlreadyPresent,
}

/// Authentication service.
///
/// Handles registration, login and account administration.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new non-admin user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` if the username is empty or too long.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UsernameTaken` if the username is already registered.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        self.create_user(username, password, false).await
    }

    /// Login with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the username/password is wrong.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let (user, password_hash) = self
            .users
            .get_credentials(username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Login to the back-office. Non-admin accounts are rejected exactly like
    /// a wrong password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the credentials are wrong or
    /// the account is not an admin.
    pub async fn login_admin(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = self.login(username, password).await?;
        if !user.is_admin {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    // =========================================================================
    // Account Management
    // =========================================================================

    /// Create a user with the given admin flag.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername`, `AuthError::WeakPassword` or
    /// `AuthError::UsernameTaken` on invalid input.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<User, AuthError> {
        let username = validate_username(username)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(username, &password_hash, is_admin)
            .await
            .map_err(map_conflict)?;

        info!(user_id = %user.id, is_admin, "User created");
        Ok(user)
    }

    /// Update a user's name and admin flag, and their password when one is given.
    ///
    /// A blank password leaves the existing hash in place.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    /// Returns `AuthError::InvalidUsername`, `AuthError::WeakPassword` or
    /// `AuthError::UsernameTaken` on invalid input.
    pub async fn update_user(
        &self,
        id: UserId,
        username: &str,
        password: Option<&str>,
        is_admin: bool,
    ) -> Result<User, AuthError> {
        let username = validate_username(username)?;
        let password_hash = match password.filter(|p| !p.is_empty()) {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let user = self
            .users
            .update(id, username, password_hash.as_deref(), is_admin)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => map_conflict(other),
            })?;

        info!(user_id = %user.id, is_admin, "User updated");
        Ok(user)
    }

    /// Delete a non-admin user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CannotDeleteAdmin` if the user is flagged admin.
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn delete_user(&self, id: UserId) -> Result<(), AuthError> {
        self.users.delete_non_admin(id).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::CannotDeleteAdmin,
            RepositoryError::NotFound => AuthError::UserNotFound,
            other => AuthError::Repository(other),
        })?;

        info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Ensure an `admin` account with the admin flag exists.
    ///
    /// Creates it with `password` when absent. An existing account's password
    /// is never reset, so running this repeatedly is harmless.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if a new account would get a too-short password.
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn bootstrap_admin(
        &self,
        password: &SecretString,
    ) -> Result<BootstrapOutcome, AuthError> {
        if self
            .users
            .get_by_username(BOOTSTRAP_ADMIN_USERNAME)
            .await?
            .is_none()
        {
            let password = password.expose_secret();
            validate_password(password)?;
            let password_hash = hash_password(password)?;

            if self
                .users
                .insert_if_absent(BOOTSTRAP_ADMIN_USERNAME, &password_hash, true)
                .await?
            {
                if password == DEFAULT_ADMIN_PASSWORD {
                    warn!("Bootstrap admin created with the default password; change it");
                } else {
                    info!("Bootstrap admin created");
                }
                return Ok(BootstrapOutcome::Created);
            }
        }

        if self.users.promote_to_admin(BOOTSTRAP_ADMIN_USERNAME).await? {
            warn!("Existing 'admin' account was missing the admin flag; flag set");
            return Ok(BootstrapOutcome::Promoted);
        }

        Ok(BootstrapOutcome::AlreadyPresent)
    }
}

fn map_conflict(err: RepositoryError) -> AuthError {
    match err {
        RepositoryError::Conflict(_) => AuthError::UsernameTaken,
        other => AuthError::Repository(other),
    }
}

/// Validate and trim a username.
fn validate_username(username: &str) -> Result<&str, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::InvalidUsername(
            "username must not be empty".to_owned(),
        ));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AuthError::InvalidUsername(format!(
            "username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }
    Ok(username)
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored PHC hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the password does not match or
/// the stored hash is unreadable.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username("  alice ").unwrap(), "alice");
        assert!(validate_username("   ").is_err());
        assert!(validate_username(&"x".repeat(81)).is_err());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let pool = test_support::pool().await;
        let auth = AuthService::new(&pool);

        let user = auth.register("alice", "secret1").await.unwrap();
        assert!(!user.is_admin);

        let logged_in = auth.login("alice", "secret1").await.unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_look_the_same() {
        let pool = test_support::pool().await;
        let auth = AuthService::new(&pool);
        auth.register("alice", "secret1").await.unwrap();

        let unknown = auth.login("nobody", "secret1").await.unwrap_err();
        let wrong = auth.login("alice", "nope-nope").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_first_record() {
        let pool = test_support::pool().await;
        let auth = AuthService::new(&pool);

        let first = auth.register("bob", "password-one").await.unwrap();
        let second = auth.register("bob", "password-two").await;
        assert!(matches!(second, Err(AuthError::UsernameTaken)));

        let user = auth.login("bob", "password-one").await.unwrap();
        assert_eq!(user.id, first.id);
        assert!(auth.login("bob", "password-two").await.is_err());
    }

    #[tokio::test]
    async fn test_admin_login_rejects_regular_user() {
        let pool = test_support::pool().await;
        let auth = AuthService::new(&pool);
        auth.register("carol", "secret1").await.unwrap();
        auth.create_user("boss", "secret1", true).await.unwrap();

        assert!(matches!(
            auth.login_admin("carol", "secret1").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(auth.login_admin("boss", "secret1").await.unwrap().is_admin);
    }

    #[tokio::test]
    async fn test_update_user_with_blank_password_keeps_old_one() {
        let pool = test_support::pool().await;
        let auth = AuthService::new(&pool);
        let user = auth.register("dave", "secret1").await.unwrap();

        auth.update_user(user.id, "dave", Some(""), true).await.unwrap();
        assert!(auth.login_admin("dave", "secret1").await.is_ok());

        auth.update_user(user.id, "dave", Some("secret2"), true)
            .await
            .unwrap();
        assert!(auth.login("dave", "secret1").await.is_err());
        assert!(auth.login("dave", "secret2").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_admin_is_refused() {
        let pool = test_support::pool().await;
        let auth = AuthService::new(&pool);
        let admin = auth.create_user("root", "secret1", true).await.unwrap();

        assert!(matches!(
            auth.delete_user(admin.id).await,
            Err(AuthError::CannotDeleteAdmin)
        ));
        assert!(auth.login("root", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn test_bootstrap_twice_yields_one_admin() {
        let pool = test_support::pool().await;
        let auth = AuthService::new(&pool);
        let password = SecretString::from(DEFAULT_ADMIN_PASSWORD.to_owned());

        assert_eq!(
            auth.bootstrap_admin(&password).await.unwrap(),
            BootstrapOutcome::Created
        );
        assert_eq!(
            auth.bootstrap_admin(&password).await.unwrap(),
            BootstrapOutcome::AlreadyPresent
        );

        let users = UserRepository::new(&pool);
        assert_eq!(users.count_by_username("admin").await.unwrap(), 1);
        let admin = users.get_by_username("admin").await.unwrap().unwrap();
        assert!(admin.is_admin);
    }

    #[tokio::test]
    async fn test_bootstrap_does_not_reset_password() {
        let pool = test_support::pool().await;
        let auth = AuthService::new(&pool);

        auth.bootstrap_admin(&SecretString::from("first-pass".to_owned()))
            .await
            .unwrap();
        auth.bootstrap_admin(&SecretString::from("second-pass".to_owned()))
            .await
            .unwrap();

        assert!(auth.login_admin("admin", "first-pass").await.is_ok());
        assert!(auth.login_admin("admin", "second-pass").await.is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_promotes_plain_admin_account() {
        let pool = test_support::pool().await;
        let auth = AuthService::new(&pool);
        auth.register("admin", "secret1").await.unwrap();

        assert_eq!(
            auth.bootstrap_admin(&SecretString::from("ignored".to_owned()))
                .await
                .unwrap(),
            BootstrapOutcome::Promoted
        );
        assert!(auth.login_admin("admin", "secret1").await.is_ok());
    }
}
