//! Scratch card (transaction record) domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use scratchcard_core::{CardId, CardSection, CardState, TemplateId, customization_deadline};

/// A customer's scratch card and its customization state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardTransaction {
    pub id: CardId,
    /// Etsy transaction (order line) the card was issued for.
    pub etsy_transaction_id: Option<i64>,
    pub receipt_id: Option<i64>,
    /// Snake case on the wire, as the card designer sends it back.
    #[serde(rename = "listing_id")]
    pub listing_id: Option<i64>,
    pub customer_email: Option<String>,
    pub template_id: Option<TemplateId>,
    /// Customization deadline.
    pub last_date: DateTime<Utc>,
    pub complete: bool,
    pub card_body: Option<CardSection>,
    pub card_header: Option<CardSection>,
    pub card_view_url: Option<String>,
    /// When the customization link was emailed to the buyer.
    #[serde(skip)]
    pub link_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CardTransaction {
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> CardState {
        CardState::evaluate(self.complete, self.last_date, now)
    }

    /// Relative link the frontend uses to show the finished card.
    #[must_use]
    pub fn view_path(&self) -> String {
        view_path(self.id)
    }
}

/// Relative link for viewing a card.
#[must_use]
pub fn view_path(id: CardId) -> String {
    format!("/card-view/{id}")
}

/// Fields for inserting a new card.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub id: CardId,
    pub etsy_transaction_id: Option<i64>,
    pub receipt_id: Option<i64>,
    pub listing_id: Option<i64>,
    pub customer_email: Option<String>,
    pub template_id: Option<TemplateId>,
    pub last_date: DateTime<Utc>,
    pub complete: bool,
    pub card_body: Option<CardSection>,
    pub card_header: Option<CardSection>,
}

impl NewCard {
    /// A card issued for a purchased order line, waiting for the buyer.
    #[must_use]
    pub fn for_order(
        etsy_transaction_id: i64,
        receipt_id: i64,
        listing_id: i64,
        customer_email: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CardId::generate(),
            etsy_transaction_id: Some(etsy_transaction_id),
            receipt_id: Some(receipt_id),
            listing_id: Some(listing_id),
            customer_email,
            template_id: None,
            last_date: customization_deadline(now),
            complete: false,
            card_body: None,
            card_header: None,
        }
    }

    /// A card created and customized in one step from the card designer.
    #[must_use]
    pub fn customized(
        listing_id: Option<i64>,
        template_id: Option<TemplateId>,
        card_body: CardSection,
        card_header: CardSection,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CardId::generate(),
            etsy_transaction_id: None,
            receipt_id: None,
            listing_id,
            customer_email: None,
            template_id,
            last_date: customization_deadline(now),
            complete: true,
            card_body: Some(card_body),
            card_header: Some(card_header),
        }
    }
}
