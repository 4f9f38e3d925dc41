//! Etsy shop connection repository.
//!
//! Stores the OAuth token pair of the connected shop. Only one shop is
//! connected at a time; the most recently updated row wins.

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use super::RepositoryError;
use crate::etsy::{EtsyToken, ShopConnection};

/// Internal row type for `PostgreSQL` queries.
#[derive(Debug, sqlx::FromRow)]
struct EtsyConnectionRow {
    shop_id: i64,
    shop_name: String,
    user_id: i64,
    access_token: String,
    refresh_token: String,
    expires_at: i64,
}

impl From<EtsyConnectionRow> for ShopConnection {
    fn from(row: EtsyConnectionRow) -> Self {
        Self {
            shop_id: row.shop_id,
            shop_name: row.shop_name,
            user_id: row.user_id,
            token: EtsyToken {
                access_token: SecretString::from(row.access_token),
                refresh_token: SecretString::from(row.refresh_token),
                expires_at: row.expires_at,
            },
        }
    }
}

/// Repository for the Etsy shop connection.
pub struct EtsyConnectionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EtsyConnectionRepository<'a> {
    /// Create a new connection repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the connected shop, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn current(&self) -> Result<Option<ShopConnection>, RepositoryError> {
        let row = sqlx::query_as::<_, EtsyConnectionRow>(
            r"
            SELECT shop_id, shop_name, user_id, access_token, refresh_token, expires_at
            FROM etsy_connection
            ORDER BY updated_at DESC
            LIMIT 1
            ",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ShopConnection::from))
    }

    /// Save or replace the connection for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, connection: &ShopConnection) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO etsy_connection
                (shop_id, shop_name, user_id, access_token, refresh_token, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (shop_id) DO UPDATE SET
                shop_name = EXCLUDED.shop_name,
                user_id = EXCLUDED.user_id,
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                updated_at = now()
            ",
        )
        .bind(connection.shop_id)
        .bind(&connection.shop_name)
        .bind(connection.user_id)
        .bind(connection.token.access_token.expose_secret())
        .bind(connection.token.refresh_token.expose_secret())
        .bind(connection.token.expires_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Store a rotated token pair.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the shop is not connected.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_token(&self, shop_id: i64, token: &EtsyToken) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE etsy_connection
            SET access_token = $2, refresh_token = $3, expires_at = $4, updated_at = now()
            WHERE shop_id = $1
            ",
        )
        .bind(shop_id)
        .bind(token.access_token.expose_secret())
        .bind(token.refresh_token.expose_secret())
        .bind(token.expires_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
