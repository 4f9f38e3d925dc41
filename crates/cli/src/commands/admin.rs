//! Admin user management commands.
//!
//! Accounts created here skip the server's registration gate, so this is how
//! additional admins are added once self-registration has closed.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `ADMIN_PASSWORD` - Password for `admin create`

use scratchcard_core::{Email, EmailError, Username, UsernameError};
use scratchcard_server::db::{self, AdminUserRepository, RepositoryError};
use scratchcard_server::services::auth::{AuthError, hash_password, validate_password};
use thiserror::Error;

use super::{MissingEnvVar, database_url};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVar),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("{0}")]
    Password(#[from] AuthError),

    #[error("Admin user already exists: {0}")]
    UserExists(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Create a new admin user.
///
/// # Errors
///
/// Returns an error if input is invalid, the username is taken, or the
/// database is unreachable.
pub async fn create_user(username: &str, email: Option<&str>) -> Result<(), AdminError> {
    let username = Username::parse(username)?;
    let email = email.map(Email::parse).transpose()?;

    let database_url = database_url()?;
    let password =
        std::env::var("ADMIN_PASSWORD").map_err(|_| MissingEnvVar("ADMIN_PASSWORD"))?;
    validate_password(&password)?;
    let password_hash = hash_password(&password)?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    let admin = AdminUserRepository::new(&pool)
        .create(&username, email.as_ref(), &password_hash)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(username.to_string()),
            other => other.into(),
        })?;

    tracing::info!(id = %admin.id, username = %admin.username, "Admin user created");
    Ok(())
}

/// List admin users.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn list_users() -> Result<(), AdminError> {
    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;

    let admins = AdminUserRepository::new(&pool).list_all().await?;
    if admins.is_empty() {
        tracing::info!("No admin users");
    }
    for admin in admins {
        tracing::info!(
            id = %admin.id,
            username = %admin.username,
            email = admin.email.as_ref().map_or("-", Email::as_str),
            created_at = %admin.created_at,
            "Admin user"
        );
    }
    Ok(())
}
