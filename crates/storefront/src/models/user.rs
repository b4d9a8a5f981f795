//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_core::UserId;

/// A storefront account (domain type).
///
/// The password hash is not part of this type; it is only read
/// by the credential lookup used at login.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Whether the user may access the back-office.
    pub is_admin: bool,
    /// Persisted cart snapshot (JSON object of product ID to quantity).
    #[serde(skip)]
    pub cart_snapshot: String,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}
