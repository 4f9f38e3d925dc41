//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer, cookie::SameSite};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::Config;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "scratchcard_session";

/// Session schema and table (created by migration).
pub const SESSION_SCHEMA: &str = "public";
pub const SESSION_TABLE: &str = "session";

/// Invalid session store configuration.
#[derive(Debug, thiserror::Error)]
#[error("invalid session store: {0}")]
pub struct SessionStoreError(String);

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// When the admin frontend is served from another site, the cookie must be
/// `SameSite=None; Secure` for the browser to send it on API calls.
///
/// # Errors
///
/// Returns an error if the session schema or table name is invalid.
pub fn create_session_layer(
    pool: &PgPool,
    config: &Config,
) -> Result<SessionManagerLayer<PostgresStore>, SessionStoreError> {
    let store = PostgresStore::new(pool.clone())
        .with_schema_name(SESSION_SCHEMA)
        .map_err(|e| SessionStoreError(e.to_string()))?
        .with_table_name(SESSION_TABLE)
        .map_err(|e| SessionStoreError(e.to_string()))?;

    let is_secure = config.base_url.starts_with("https://") || config.session_cross_site;
    let same_site = if config.session_cross_site {
        SameSite::None
    } else {
        SameSite::Lax
    };

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(same_site)
        .with_http_only(true)
        .with_path("/"))
}
