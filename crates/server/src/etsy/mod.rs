//! Etsy Open API v3 client.
//!
//! Covers the OAuth token lifecycle (PKCE authorization, code exchange,
//! refresh), read access to shop sections, listings and receipts, webhook
//! registration, and verification of incoming webhook deliveries.
//!
//! # Architecture
//!
//! - One shop is connected at a time; its tokens live in the database and are
//!   cached in memory by [`EtsyClient`]
//! - Every API call goes through a single authorized-request path that
//!   refreshes expiring tokens and retries once on HTTP 401
//! - Token persistence is behind the [`TokenStore`] trait so the client can be
//!   exercised without a database

pub mod auth;
pub mod client;
pub mod pkce;
pub mod store;
pub mod types;
pub mod webhook;

pub use auth::{EtsyToken, ShopConnection};
pub use client::EtsyClient;
pub use pkce::{PendingAuthorizations, PkceChallenge};
pub use store::{MemoryTokenStore, PgTokenStore, TokenStore};
pub use types::*;

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur when interacting with the Etsy API.
#[derive(Debug, Error)]
pub enum EtsyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Etsy API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or error description.
        message: String,
    },

    /// The OAuth token endpoint rejected a code exchange or refresh.
    #[error("Token request failed ({status}): {message}")]
    TokenRequest {
        /// HTTP status code.
        status: u16,
        /// `error_description` from the token endpoint.
        message: String,
    },

    /// The access token was still rejected after a refresh.
    #[error("Access token rejected after refresh")]
    Unauthorized,

    /// No shop has completed the OAuth flow yet.
    #[error("No Etsy shop connected")]
    NotConnected,

    /// Response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    /// An endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Token persistence failed.
    #[error("Token store error: {0}")]
    Store(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etsy_error_display() {
        let err = EtsyError::Api {
            status: 404,
            message: "Shop not found".to_string(),
        };
        assert_eq!(err.to_string(), "Etsy API error (404): Shop not found");
        assert_eq!(EtsyError::NotConnected.to_string(), "No Etsy shop connected");
    }
}
