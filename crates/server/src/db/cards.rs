//! Scratch card (transaction record) repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use scratchcard_core::{CardId, CardSection, TemplateId};

use super::{RepositoryError, map_unique_violation};
use crate::models::{CardTransaction, NewCard};

/// Internal row type for `PostgreSQL` card queries.
#[derive(Debug, sqlx::FromRow)]
struct CardRow {
    id: Uuid,
    etsy_transaction_id: Option<i64>,
    receipt_id: Option<i64>,
    listing_id: Option<i64>,
    customer_email: Option<String>,
    template_id: Option<Uuid>,
    last_date: DateTime<Utc>,
    complete: bool,
    card_body: Option<Json<CardSection>>,
    card_header: Option<Json<CardSection>>,
    card_view_url: Option<String>,
    link_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CardRow> for CardTransaction {
    fn from(row: CardRow) -> Self {
        Self {
            id: CardId::new(row.id),
            etsy_transaction_id: row.etsy_transaction_id,
            receipt_id: row.receipt_id,
            listing_id: row.listing_id,
            customer_email: row.customer_email,
            template_id: row.template_id.map(TemplateId::new),
            last_date: row.last_date,
            complete: row.complete,
            card_body: row.card_body.map(|Json(section)| section),
            card_header: row.card_header.map(|Json(section)| section),
            card_view_url: row.card_view_url,
            link_sent_at: row.link_sent_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const COLUMNS: &str = "id, etsy_transaction_id, receipt_id, listing_id, customer_email, \
                       template_id, last_date, complete, card_body, card_header, \
                       card_view_url, link_sent_at, created_at, updated_at";

/// Repository for scratch card database operations.
pub struct CardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CardRepository<'a> {
    /// Create a new card repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a card by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CardId) -> Result<Option<CardTransaction>, RepositoryError> {
        let row = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {COLUMNS} FROM card_transaction WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(CardTransaction::from))
    }

    /// Whether a card was already issued for an Etsy transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists_for_transaction(
        &self,
        etsy_transaction_id: i64,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM card_transaction WHERE etsy_transaction_id = $1)",
        )
        .bind(etsy_transaction_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Insert a card.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a card already exists for the
    /// Etsy transaction.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, card: &NewCard) -> Result<CardTransaction, RepositoryError> {
        let row = sqlx::query_as::<_, CardRow>(&format!(
            "INSERT INTO card_transaction \
                (id, etsy_transaction_id, receipt_id, listing_id, customer_email, \
                 template_id, last_date, complete, card_body, card_header) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        ))
        .bind(card.id)
        .bind(card.etsy_transaction_id)
        .bind(card.receipt_id)
        .bind(card.listing_id)
        .bind(card.customer_email.as_deref())
        .bind(card.template_id)
        .bind(card.last_date)
        .bind(card.complete)
        .bind(card.card_body.as_ref().map(Json))
        .bind(card.card_header.as_ref().map(Json))
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "card already issued for transaction"))?;

        Ok(row.into())
    }

    /// Store the customer's customization and mark the card complete.
    ///
    /// Only applies to cards that are not yet complete; returns `None` if
    /// the card does not exist or was completed concurrently.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn complete(
        &self,
        id: CardId,
        card_body: &CardSection,
        card_header: &CardSection,
    ) -> Result<Option<CardTransaction>, RepositoryError> {
        let row = sqlx::query_as::<_, CardRow>(&format!(
            "UPDATE card_transaction \
             SET complete = TRUE, card_body = $2, card_header = $3, updated_at = now() \
             WHERE id = $1 AND complete = FALSE \
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(Json(card_body))
        .bind(Json(card_header))
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(CardTransaction::from))
    }

    /// Record the view link the first time a card is revealed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_view_url_if_missing(
        &self,
        id: CardId,
        view_url: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE card_transaction SET card_view_url = $2, updated_at = now() \
             WHERE id = $1 AND card_view_url IS NULL",
        )
        .bind(id)
        .bind(view_url)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Record that the customization link was emailed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_link_sent(&self, id: CardId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE card_transaction SET link_sent_at = now(), updated_at = now() \
             WHERE id = $1 AND link_sent_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Open cards with an email address whose link has not been sent yet,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pending_links(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CardTransaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {COLUMNS} FROM card_transaction \
             WHERE link_sent_at IS NULL AND complete = FALSE \
               AND customer_email IS NOT NULL AND last_date > $1 \
             ORDER BY created_at \
             LIMIT $2"
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CardTransaction::from).collect())
    }
}
