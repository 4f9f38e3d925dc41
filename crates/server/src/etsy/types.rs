//! Etsy Open API v3 resource types.
//!
//! Only the fields this service reads are modelled; unknown fields are
//! ignored during deserialization.

use serde::{Deserialize, Serialize};

/// Paginated collection envelope used by list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: i64,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Response of `GET /users/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct EtsyUser {
    pub user_id: Option<i64>,
    pub shop_id: Option<i64>,
}

/// Response of `GET /shops/{shop_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Shop {
    pub shop_id: i64,
    pub shop_name: Option<String>,
    pub user_id: Option<i64>,
}

/// A shop section (listing category defined by the seller).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopSection {
    pub shop_section_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub active_listing_count: Option<i64>,
}

/// A listing's price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Money {
    pub amount: i64,
    pub divisor: i64,
    pub currency_code: String,
}

/// A shop listing (product).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub listing_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub shop_section_id: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub price: Option<Money>,
}

impl Listing {
    /// Whether the listing is live and belongs to the given section.
    #[must_use]
    pub fn is_active_in(&self, section_id: i64) -> bool {
        self.shop_section_id == Some(section_id) && self.state == "active"
    }
}

/// One line item of a receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptTransaction {
    pub transaction_id: i64,
    #[serde(default)]
    pub receipt_id: Option<i64>,
    #[serde(default)]
    pub listing_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

/// An order receipt, with its line items embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: i64,
    #[serde(default)]
    pub buyer_email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub create_timestamp: Option<i64>,
    #[serde(default)]
    pub transactions: Vec<ReceiptTransaction>,
}

/// Request body for `POST /shops/{shop_id}/webhooks`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateWebhook<'a> {
    pub event_name: &'a str,
    pub callback_url: &'a str,
    pub shop_id: i64,
}

/// Webhook subscription as returned by Etsy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRegistration {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
