//! Admin user domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use scratchcard_core::{AdminUserId, Email, Username};

/// An admin user (domain type).
///
/// The password hash never leaves the server: it is skipped during
/// serialization and redacted from `Debug`.
#[derive(Clone, Serialize)]
pub struct AdminUser {
    /// Unique admin user ID.
    pub id: AdminUserId,
    /// Login name.
    pub username: Username,
    /// Optional contact address.
    pub email: Option<Email>,
    /// Argon2 PHC string.
    #[serde(skip)]
    pub password_hash: String,
    /// When the admin was created.
    pub created_at: DateTime<Utc>,
    /// When the admin was last updated.
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for AdminUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminUser")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}
