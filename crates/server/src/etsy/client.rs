//! Etsy Open API v3 HTTP client.
//!
//! All shop-scoped requests share one authorized-request path:
//!
//! 1. Load the connection (memory cache, then the token store)
//! 2. Refresh first if the access token expires within 60 seconds
//! 3. Send; on HTTP 401 refresh once and retry once
//!
//! Refreshes are serialized behind a mutex. Etsy rotates the refresh token on
//! every refresh, so two concurrent refreshes with the same refresh token
//! would invalidate each other.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;
use url::Url;

use super::auth::{self, ShopConnection};
use super::pkce::PkceChallenge;
use super::store::TokenStore;
use super::types::{
    CreateWebhook, EtsyUser, Listing, Page, Receipt, ReceiptTransaction, Shop, ShopSection,
    WebhookRegistration,
};
use super::EtsyError;
use crate::config::EtsyConfig;

/// Page size for listing pagination (Etsy's maximum).
pub const LISTING_PAGE_SIZE: usize = 100;

/// Upper bound on pages fetched in one pagination loop.
pub const MAX_LISTING_PAGES: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 500;

/// Etsy API client bound to the single connected shop.
#[derive(Clone)]
pub struct EtsyClient {
    inner: Arc<EtsyClientInner>,
}

struct EtsyClientInner {
    http: reqwest::Client,
    api_base: String,
    token_url: String,
    connect_url: String,
    client_id: String,
    client_secret: Option<SecretString>,
    redirect_uri: String,
    store: Arc<dyn TokenStore>,
    /// In-memory connection cache
    connection: RwLock<Option<ShopConnection>>,
    /// Held while a refresh is in flight
    refresh_lock: Mutex<()>,
}

impl EtsyClient {
    /// Create a client for the configured app.
    ///
    /// # Errors
    ///
    /// Returns `EtsyError::Http` if the HTTP client cannot be built.
    pub fn new(config: &EtsyConfig, store: Arc<dyn TokenStore>) -> Result<Self, EtsyError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(EtsyClientInner {
                http,
                api_base: config.api_base_url.trim_end_matches('/').to_string(),
                token_url: config.token_url.clone(),
                connect_url: config.connect_url.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                redirect_uri: config.redirect_uri.clone(),
                store,
                connection: RwLock::new(None),
                refresh_lock: Mutex::new(()),
            }),
        })
    }

    /// Value of the `x-api-key` header: `keystring` or `keystring:secret`.
    #[must_use]
    pub fn api_key(&self) -> String {
        match &self.inner.client_secret {
            Some(secret) => format!("{}:{}", self.inner.client_id, secret.expose_secret()),
            None => self.inner.client_id.clone(),
        }
    }

    // =========================================================================
    // OAuth
    // =========================================================================

    /// Consent URL for a PKCE challenge.
    ///
    /// # Errors
    ///
    /// Returns `EtsyError::Url` if the configured connect URL is invalid.
    pub fn authorization_url(&self, pkce: &PkceChallenge) -> Result<String, EtsyError> {
        auth::authorization_url(
            &self.inner.connect_url,
            &self.inner.client_id,
            &self.inner.redirect_uri,
            &pkce.state,
            &pkce.challenge,
        )
    }

    /// Complete the OAuth flow: exchange the code, identify the shop, and
    /// persist the connection.
    ///
    /// # Errors
    ///
    /// Returns `EtsyError::TokenRequest` if the exchange fails,
    /// `EtsyError::InvalidResponse` if the user has no shop.
    #[instrument(skip(self, code, code_verifier))]
    pub async fn connect(
        &self,
        code: &str,
        code_verifier: &SecretString,
    ) -> Result<ShopConnection, EtsyError> {
        let token = auth::exchange_code(
            &self.inner.http,
            &self.inner.token_url,
            &self.inner.client_id,
            &self.inner.redirect_uri,
            code,
            code_verifier,
        )
        .await?;

        let (user_id, shop) = self.fetch_owner(&token.access_token).await?;
        let shop_name = shop
            .shop_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| EtsyError::InvalidResponse("shop name missing".to_string()))?;

        let connection = ShopConnection {
            shop_id: shop.shop_id,
            shop_name,
            user_id,
            token,
        };

        self.inner.store.save(&connection).await?;
        *self.inner.connection.write().await = Some(connection.clone());

        tracing::info!(
            shop_id = connection.shop_id,
            shop_name = %connection.shop_name,
            "Etsy shop connected"
        );
        Ok(connection)
    }

    /// Identify the user and shop behind a fresh access token.
    async fn fetch_owner(&self, access_token: &SecretString) -> Result<(i64, Shop), EtsyError> {
        let me_url = self.endpoint("/users/me", &[])?;
        let response = self.send_once(&Method::GET, &me_url, None, access_token).await?;
        let me: EtsyUser = Self::parse_response(response).await?;

        let (Some(user_id), Some(shop_id)) = (me.user_id, me.shop_id) else {
            return Err(EtsyError::InvalidResponse(
                "user ID or shop ID missing".to_string(),
            ));
        };

        let shop_url = self.endpoint(&format!("/shops/{shop_id}"), &[])?;
        let response = self
            .send_once(&Method::GET, &shop_url, None, access_token)
            .await?;
        let shop: Shop = Self::parse_response(response).await?;

        Ok((user_id, shop))
    }

    // =========================================================================
    // Connection and token lifecycle
    // =========================================================================

    /// The connected shop, if any.
    ///
    /// # Errors
    ///
    /// Returns `EtsyError::Store` if the token store cannot be read.
    pub async fn connection(&self) -> Result<Option<ShopConnection>, EtsyError> {
        if let Some(connection) = self.inner.connection.read().await.clone() {
            return Ok(Some(connection));
        }

        let loaded = self.inner.store.load().await?;
        if let Some(connection) = &loaded {
            *self.inner.connection.write().await = Some(connection.clone());
        }
        Ok(loaded)
    }

    /// The connected shop, or `EtsyError::NotConnected`.
    ///
    /// # Errors
    ///
    /// Returns `EtsyError::NotConnected` if no shop has been connected.
    pub async fn require_connection(&self) -> Result<ShopConnection, EtsyError> {
        self.connection().await?.ok_or(EtsyError::NotConnected)
    }

    /// The connected shop with an access token that is not about to expire.
    ///
    /// # Errors
    ///
    /// Returns `EtsyError::NotConnected` or a refresh error.
    pub async fn valid_connection(&self) -> Result<ShopConnection, EtsyError> {
        let connection = self.require_connection().await?;
        if connection.token.is_expired() {
            tracing::debug!(shop_id = connection.shop_id, "Etsy token expiring, refreshing");
            return self.refresh_after(&connection).await;
        }
        Ok(connection)
    }

    /// Refresh the token pair unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `EtsyError::NotConnected` or `EtsyError::TokenRequest`.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<ShopConnection, EtsyError> {
        let _guard = self.inner.refresh_lock.lock().await;
        let current = self.require_connection().await?;
        self.perform_refresh(current).await
    }

    /// Refresh the token unless another task already replaced `seen`.
    async fn refresh_after(&self, seen: &ShopConnection) -> Result<ShopConnection, EtsyError> {
        let _guard = self.inner.refresh_lock.lock().await;
        let current = self.require_connection().await?;

        let rotated = current.token.access_token.expose_secret()
            != seen.token.access_token.expose_secret();
        if rotated && !current.token.is_expired() {
            return Ok(current);
        }

        self.perform_refresh(current).await
    }

    /// Caller must hold `refresh_lock`.
    async fn perform_refresh(&self, current: ShopConnection) -> Result<ShopConnection, EtsyError> {
        let token = auth::refresh_access_token(
            &self.inner.http,
            &self.inner.token_url,
            &self.inner.client_id,
            &current.token.refresh_token,
        )
        .await?;

        self.inner
            .store
            .update_token(current.shop_id, &token)
            .await?;

        let refreshed = ShopConnection { token, ..current };
        *self.inner.connection.write().await = Some(refreshed.clone());

        tracing::info!(shop_id = refreshed.shop_id, "Etsy access token refreshed");
        Ok(refreshed)
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, EtsyError> {
        let raw = format!("{}{path}", self.inner.api_base);
        let url = if query.is_empty() {
            Url::parse(&raw)?
        } else {
            Url::parse_with_params(&raw, query)?
        };
        Ok(url)
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        access_token: &SecretString,
    ) -> Result<reqwest::Response, EtsyError> {
        let mut request = self
            .inner
            .http
            .request(method.clone(), url.clone())
            .header("x-api-key", self.api_key())
            .bearer_auth(access_token.expose_secret());

        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    /// Send with pre-emptive refresh and a single refresh + retry on 401.
    async fn send_authorized<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<T, EtsyError> {
        let connection = self.valid_connection().await?;
        let mut response = self
            .send_once(&method, &url, body, &connection.token.access_token)
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!(path = url.path(), "Etsy rejected access token, refreshing");
            let refreshed = self.refresh_after(&connection).await?;
            response = self
                .send_once(&method, &url, body, &refreshed.token.access_token)
                .await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(EtsyError::Unauthorized);
            }
        }

        Self::parse_response(response).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, EtsyError> {
        let url = self.endpoint(path, query)?;
        self.send_authorized(Method::GET, url, None).await
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EtsyError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(EtsyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| EtsyError::InvalidResponse(e.to_string()))
    }

    // =========================================================================
    // Shop resources
    // =========================================================================

    /// Sections of a shop.
    ///
    /// # Errors
    ///
    /// Returns an `EtsyError` if the request fails.
    #[instrument(skip(self))]
    pub async fn shop_sections(&self, shop_id: i64) -> Result<Vec<ShopSection>, EtsyError> {
        let page: Page<ShopSection> = self.get(&format!("/shops/{shop_id}/sections"), &[]).await?;
        Ok(page.results)
    }

    /// Active listings in a shop section.
    ///
    /// Returns `None` when the shop has no sections or the section does not
    /// exist. Pages through the shop's listings 100 at a time, stopping on an
    /// empty or short page, and keeps only active listings of the section.
    ///
    /// # Errors
    ///
    /// Returns an `EtsyError` if any request fails.
    #[instrument(skip(self))]
    pub async fn section_listings(
        &self,
        shop_id: i64,
        section_id: i64,
    ) -> Result<Option<Vec<Listing>>, EtsyError> {
        let sections = self.shop_sections(shop_id).await?;
        if !sections.iter().any(|s| s.shop_section_id == section_id) {
            tracing::debug!(section_id, "Shop section not found");
            return Ok(None);
        }

        let path = format!("/shops/{shop_id}/listings");
        let listings = self
            .paginate(&path, &[
                ("shop_section_id", section_id.to_string()),
                ("include_private", "true".to_string()),
            ])
            .await?;

        Ok(Some(
            listings
                .into_iter()
                .filter(|listing| listing.is_active_in(section_id))
                .collect(),
        ))
    }

    /// All active listings of a shop.
    ///
    /// # Errors
    ///
    /// Returns an `EtsyError` if any request fails.
    #[instrument(skip(self))]
    pub async fn active_listings(&self, shop_id: i64) -> Result<Vec<Listing>, EtsyError> {
        self.paginate(&format!("/shops/{shop_id}/listings/active"), &[])
            .await
    }

    async fn paginate(
        &self,
        path: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<Listing>, EtsyError> {
        let mut all = Vec::new();

        for page_index in 0..MAX_LISTING_PAGES {
            let mut query = filters.to_vec();
            query.push(("limit", LISTING_PAGE_SIZE.to_string()));
            query.push(("offset", (page_index * LISTING_PAGE_SIZE).to_string()));

            let page: Page<Listing> = self.get(path, &query).await?;
            let fetched = page.results.len();
            all.extend(page.results);

            if fetched < LISTING_PAGE_SIZE {
                return Ok(all);
            }
        }

        tracing::warn!(path, pages = MAX_LISTING_PAGES, "Listing pagination cap reached");
        Ok(all)
    }

    /// Most recent receipts (with line items), newest first.
    ///
    /// # Errors
    ///
    /// Returns an `EtsyError` if the request fails.
    #[instrument(skip(self))]
    pub async fn recent_receipts(
        &self,
        shop_id: i64,
        limit: usize,
    ) -> Result<Vec<Receipt>, EtsyError> {
        let page: Page<Receipt> = self
            .get(&format!("/shops/{shop_id}/receipts"), &[
                ("limit", limit.to_string()),
                ("sort_on", "created".to_string()),
                ("sort_order", "desc".to_string()),
            ])
            .await?;
        Ok(page.results)
    }

    /// Line items of one receipt.
    ///
    /// # Errors
    ///
    /// Returns an `EtsyError` if the request fails.
    #[instrument(skip(self))]
    pub async fn receipt_transactions(
        &self,
        shop_id: i64,
        receipt_id: i64,
    ) -> Result<Vec<ReceiptTransaction>, EtsyError> {
        let page: Page<ReceiptTransaction> = self
            .get(
                &format!("/shops/{shop_id}/receipts/{receipt_id}/transactions"),
                &[],
            )
            .await?;
        Ok(page.results)
    }

    /// A single line item.
    ///
    /// # Errors
    ///
    /// Returns an `EtsyError` if the request fails.
    #[instrument(skip(self))]
    pub async fn transaction(
        &self,
        shop_id: i64,
        transaction_id: i64,
    ) -> Result<ReceiptTransaction, EtsyError> {
        self.get(&format!("/shops/{shop_id}/transactions/{transaction_id}"), &[])
            .await
    }

    /// Subscribe the shop to a webhook event.
    ///
    /// # Errors
    ///
    /// Returns an `EtsyError` if the request fails.
    #[instrument(skip(self))]
    pub async fn create_webhook(
        &self,
        shop_id: i64,
        event_name: &str,
        callback_url: &str,
    ) -> Result<WebhookRegistration, EtsyError> {
        let url = self.endpoint(&format!("/shops/{shop_id}/webhooks"), &[])?;
        let body = serde_json::to_value(CreateWebhook {
            event_name,
            callback_url,
            shop_id,
        })
        .map_err(|e| EtsyError::InvalidResponse(e.to_string()))?;

        self.send_authorized(Method::POST, url, Some(&body)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_ETSY_CONNECT_URL, DEFAULT_ETSY_TOKEN_URL};
    use crate::etsy::MemoryTokenStore;

    fn config(secret: Option<&str>) -> EtsyConfig {
        EtsyConfig {
            client_id: "keystring".to_string(),
            client_secret: secret.map(|s| SecretString::from(s.to_string())),
            redirect_uri: "http://localhost:5000/api/etsy/auth/oauth/redirect".to_string(),
            section_id: None,
            webhook_secret: None,
            webhook_callback_url: "http://localhost:5000/api/etsy/etsy-webhook".to_string(),
            api_base_url: "https://openapi.etsy.com/v3/application/".to_string(),
            token_url: DEFAULT_ETSY_TOKEN_URL.to_string(),
            connect_url: DEFAULT_ETSY_CONNECT_URL.to_string(),
        }
    }

    #[test]
    fn test_api_key_with_and_without_secret() {
        let store = Arc::new(MemoryTokenStore::new());
        let plain = EtsyClient::new(&config(None), store.clone()).unwrap();
        assert_eq!(plain.api_key(), "keystring");

        let with_secret = EtsyClient::new(&config(Some("shared")), store).unwrap();
        assert_eq!(with_secret.api_key(), "keystring:shared");
    }

    #[test]
    fn test_endpoint_joins_base_and_query() {
        let client = EtsyClient::new(&config(None), Arc::new(MemoryTokenStore::new())).unwrap();
        let url = client
            .endpoint("/shops/1/listings", &[("limit", "100".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://openapi.etsy.com/v3/application/shops/1/listings?limit=100"
        );

        let bare = client.endpoint("/users/me", &[]).unwrap();
        assert_eq!(bare.as_str(), "https://openapi.etsy.com/v3/application/users/me");
    }

    #[tokio::test]
    async fn test_require_connection_when_empty() {
        let client = EtsyClient::new(&config(None), Arc::new(MemoryTokenStore::new())).unwrap();
        assert!(matches!(
            client.require_connection().await,
            Err(EtsyError::NotConnected)
        ));
    }
}
