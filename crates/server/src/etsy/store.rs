//! Persistence for the connected shop's OAuth credentials.

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;

use super::auth::{EtsyToken, ShopConnection};
use crate::db::{EtsyConnectionRepository, RepositoryError};

/// Storage backend for the shop connection.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the current connection, if any.
    async fn load(&self) -> Result<Option<ShopConnection>, RepositoryError>;

    /// Insert or replace the connection for its shop.
    async fn save(&self, connection: &ShopConnection) -> Result<(), RepositoryError>;

    /// Persist a rotated token pair.
    async fn update_token(&self, shop_id: i64, token: &EtsyToken) -> Result<(), RepositoryError>;
}

/// `PostgreSQL`-backed token store.
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn load(&self) -> Result<Option<ShopConnection>, RepositoryError> {
        EtsyConnectionRepository::new(&self.pool).current().await
    }

    async fn save(&self, connection: &ShopConnection) -> Result<(), RepositoryError> {
        EtsyConnectionRepository::new(&self.pool)
            .upsert(connection)
            .await
    }

    async fn update_token(&self, shop_id: i64, token: &EtsyToken) -> Result<(), RepositoryError> {
        EtsyConnectionRepository::new(&self.pool)
            .update_token(shop_id, token)
            .await
    }
}

/// In-memory token store, for tests and local tooling.
#[derive(Default)]
pub struct MemoryTokenStore {
    connection: RwLock<Option<ShopConnection>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_connection(connection: ShopConnection) -> Self {
        Self {
            connection: RwLock::new(Some(connection)),
        }
    }

    /// Snapshot of the stored connection.
    pub async fn current(&self) -> Option<ShopConnection> {
        self.connection.read().await.clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<ShopConnection>, RepositoryError> {
        Ok(self.current().await)
    }

    async fn save(&self, connection: &ShopConnection) -> Result<(), RepositoryError> {
        *self.connection.write().await = Some(connection.clone());
        Ok(())
    }

    async fn update_token(&self, shop_id: i64, token: &EtsyToken) -> Result<(), RepositoryError> {
        let mut guard = self.connection.write().await;
        match guard.as_mut() {
            Some(connection) if connection.shop_id == shop_id => {
                connection.token = token.clone();
                Ok(())
            }
            _ => Err(RepositoryError::NotFound),
        }
    }
}
