//! Etsy OAuth 2.0 (PKCE) token handling.
//!
//! Etsy access tokens live for one hour. Every refresh rotates the refresh
//! token as well, so the new pair must be persisted before the old one is
//! used again.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use super::EtsyError;

/// Scopes requested during authorization.
pub const SCOPES: &str = "email_r profile_r shops_r listings_r listings_w transactions_r";

/// Seconds before expiry at which a token is treated as expired.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// OAuth token pair for the connected shop.
#[derive(Debug, Clone)]
pub struct EtsyToken {
    /// Bearer token for API requests.
    pub access_token: SecretString,
    /// Token used to obtain the next pair.
    pub refresh_token: SecretString,
    /// Unix timestamp when the access token expires.
    pub expires_at: i64,
}

impl EtsyToken {
    /// Check if the access token has expired (or will within the buffer).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_within(EXPIRY_BUFFER_SECS)
    }

    /// Check if the access token will expire within the given number of seconds.
    #[must_use]
    pub fn expires_within(&self, seconds: i64) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at - seconds
    }
}

/// The connected Etsy shop and its credentials.
#[derive(Debug, Clone)]
pub struct ShopConnection {
    pub shop_id: i64,
    pub shop_name: String,
    /// Etsy user ID of the shop owner.
    pub user_id: i64,
    pub token: EtsyToken,
}

/// Response from the token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

/// Error response from the token endpoint.
#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Build the Etsy consent URL for a PKCE authorization.
///
/// # Errors
///
/// Returns `EtsyError::Url` if `connect_url` is not a valid URL.
pub fn authorization_url(
    connect_url: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    code_challenge: &str,
) -> Result<String, EtsyError> {
    let url = Url::parse_with_params(
        connect_url,
        &[
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("scope", SCOPES),
            ("client_id", client_id),
            ("state", state),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256"),
        ],
    )?;
    Ok(url.into())
}

/// Exchange an authorization code for a token pair.
///
/// # Errors
///
/// Returns `EtsyError::TokenRequest` if Etsy rejects the code or verifier.
#[instrument(skip(client, code, code_verifier))]
pub async fn exchange_code(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    redirect_uri: &str,
    code: &str,
    code_verifier: &SecretString,
) -> Result<EtsyToken, EtsyError> {
    let response = client
        .post(token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("code", code),
            ("code_verifier", code_verifier.expose_secret()),
        ])
        .send()
        .await?;

    parse_token_response(response).await
}

/// Obtain a new token pair from a refresh token.
///
/// # Errors
///
/// Returns `EtsyError::TokenRequest` if the refresh token is invalid or revoked.
#[instrument(skip(client, refresh_token))]
pub async fn refresh_access_token(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    refresh_token: &SecretString,
) -> Result<EtsyToken, EtsyError> {
    let response = client
        .post(token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("refresh_token", refresh_token.expose_secret()),
        ])
        .send()
        .await?;

    parse_token_response(response).await
}

async fn parse_token_response(response: reqwest::Response) -> Result<EtsyToken, EtsyError> {
    let now = chrono::Utc::now().timestamp();
    let status = response.status();

    if status.is_success() {
        let body: TokenResponse = response.json().await?;
        return Ok(EtsyToken {
            access_token: SecretString::from(body.access_token),
            refresh_token: SecretString::from(body.refresh_token),
            expires_at: now + body.expires_in,
        });
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = serde_json::from_str::<TokenErrorResponse>(&error_text)
        .ok()
        .and_then(|e| e.error_description.or(e.error))
        .unwrap_or(error_text);

    Err(EtsyError::TokenRequest {
        status: status.as_u16(),
        message,
    })
}
