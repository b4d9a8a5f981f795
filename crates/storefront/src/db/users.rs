//! User repository for database operations.
//!
//! Covers the account records, their password hashes and the mirrored cart
//! snapshot. Queries are runtime-checked `sqlx` queries mapped through row
//! structs into domain types.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use bazaar_core::UserId;

use super::RepositoryError;
use crate::models::user::User;

const USER_COLUMNS: &str = "id, username, is_admin, cart, created_at, updated_at";

/// Database row for `user` (without the password hash).
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    is_admin: bool,
    cart: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: UserId::new(r.id),
            username: r.username,
            is_admin: r.is_admin,
            cart_snapshot: r.cart,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Row for the login lookup.
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user with an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<User, RepositoryError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO user (username, password_hash, is_admin, cart, created_at, updated_at)
            VALUES (?, ?, ?, '{{}}', ?, ?)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(username)
        .bind(password_hash)
        .bind(is_admin)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "username"))?;

        Ok(row.into())
    }

    /// Insert a user unless the username is already taken.
    ///
    /// Returns `true` if a row was inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_if_absent(
        &self,
        username: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            r"
            INSERT INTO user (username, password_hash, is_admin, cart, created_at, updated_at)
            VALUES (?, ?, ?, '{}', ?, ?)
            ON CONFLICT (username) DO NOTHING
            ",
        )
        .bind(username)
        .bind(password_hash)
        .bind(is_admin)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the admin flag on a user identified by name.
    ///
    /// Returns `true` if the flag changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn promote_to_admin(&self, username: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE user SET is_admin = TRUE, updated_at = ?
            WHERE username = ? AND is_admin = FALSE
            ",
        )
        .bind(Utc::now())
        .bind(username)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE id = ?"
        ))
        .bind(id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Get a user by their username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Get a user together with their password hash, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM user WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| (User::from(r.user), r.password_hash)))
    }

    /// List every user ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM user ORDER BY id ASC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Count users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Count users with a given username (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_username(&self, username: &str) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user WHERE username = ?")
            .bind(username)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Update a user's name, admin flag and (optionally) password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new username is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: UserId,
        username: &str,
        password_hash: Option<&str>,
        is_admin: bool,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE user
            SET username = ?,
                password_hash = COALESCE(?, password_hash),
                is_admin = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(username)
        .bind(password_hash)
        .bind(is_admin)
        .bind(Utc::now())
        .bind(id.as_i64())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "username"))?;

        row.map(User::from).ok_or(RepositoryError::NotFound)
    }

    /// Overwrite a user's persisted cart snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_cart(&self, id: UserId, snapshot: &str) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::update_cart_on(&mut conn, id, snapshot).await
    }

    /// Overwrite a user's persisted cart snapshot on an existing connection
    /// or transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_cart_on(
        conn: &mut SqliteConnection,
        id: UserId,
        snapshot: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE user SET cart = ?, updated_at = ? WHERE id = ?")
            .bind(snapshot)
            .bind(Utc::now())
            .bind(id.as_i64())
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Delete a user unless they are flagged admin.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user is an admin.
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn delete_non_admin(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM user WHERE id = ? AND is_admin = FALSE")
            .bind(id.as_i64())
            .execute(self.pool)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        match self.get_by_id(id).await? {
            Some(_) => Err(RepositoryError::Conflict(
                "admin accounts cannot be deleted".to_owned(),
            )),
            None => Err(RepositoryError::NotFound),
        }
    }
}
