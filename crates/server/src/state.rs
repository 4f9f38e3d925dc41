//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::etsy::{EtsyClient, EtsyError, PendingAuthorizations, PgTokenStore, TokenStore};
use crate::services::email::EmailService;
use crate::services::orders::OrderPoller;
use crate::services::storage::{StorageClient, StorageError};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("etsy client: {0}")]
    Etsy(#[from] EtsyError),
    #[error("storage client: {0}")]
    Storage(#[from] StorageError),
    #[error("smtp transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pool: PgPool,
    etsy: EtsyClient,
    pending_auth: PendingAuthorizations,
    storage: Option<StorageClient>,
    orders: OrderPoller,
}

impl AppState {
    /// Create the application state with tokens persisted in `PostgreSQL`.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the external clients cannot be built.
    pub fn new(config: Config, pool: PgPool) -> Result<Self, StateError> {
        let store = Arc::new(PgTokenStore::new(pool.clone()));
        Self::with_token_store(config, pool, store)
    }

    /// Create the application state with a custom token store.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the external clients cannot be built.
    pub fn with_token_store(
        config: Config,
        pool: PgPool,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, StateError> {
        let etsy = EtsyClient::new(&config.etsy, store)?;
        let storage = config.storage.as_ref().map(StorageClient::new).transpose()?;
        let email = config.email.as_ref().map(EmailService::new).transpose()?;

        if storage.is_none() {
            tracing::warn!("SUPABASE_URL/SUPABASE_SERVICE_KEY not set, template uploads disabled");
        }
        if email.is_none() {
            tracing::warn!("SMTP not configured, scratch card links will not be emailed");
        }

        let orders = OrderPoller::new(
            pool.clone(),
            etsy.clone(),
            email,
            config.frontend_url.clone(),
            config.etsy.section_id,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                etsy,
                pending_auth: PendingAuthorizations::new(),
                storage,
                orders,
            }),
        })
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Etsy API client.
    #[must_use]
    pub fn etsy(&self) -> &EtsyClient {
        &self.inner.etsy
    }

    /// Get a reference to the in-flight OAuth authorizations.
    #[must_use]
    pub fn pending_auth(&self) -> &PendingAuthorizations {
        &self.inner.pending_auth
    }

    /// Get a reference to the blob storage client, if configured.
    #[must_use]
    pub fn storage(&self) -> Option<&StorageClient> {
        self.inner.storage.as_ref()
    }

    /// Get a reference to the order poller.
    #[must_use]
    pub fn orders(&self) -> &OrderPoller {
        &self.inner.orders
    }
}
