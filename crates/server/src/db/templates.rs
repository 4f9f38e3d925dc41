//! Card template repository.
//!
//! `product_ids` behaves as a set: additions skip IDs already present and
//! removals drop every occurrence.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use scratchcard_core::TemplateId;

use super::RepositoryError;
use crate::models::Template;

/// Internal row type for `PostgreSQL` template queries.
#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    background_url: String,
    sticker_url: String,
    product_ids: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TemplateRow> for Template {
    fn from(row: TemplateRow) -> Self {
        Self {
            id: TemplateId::new(row.id),
            background_url: row.background_url,
            sticker_url: row.sticker_url,
            product_ids: row.product_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const COLUMNS: &str = "id, background_url, sticker_url, product_ids, created_at, updated_at";

const ADD_PRODUCT: &str = r"
    UPDATE card_template
    SET product_ids = CASE
            WHEN $2 = ANY(product_ids) THEN product_ids
            ELSE array_append(product_ids, $2)
        END,
        updated_at = now()
    WHERE id = $1
    RETURNING id, background_url, sticker_url, product_ids, created_at, updated_at
";

const REMOVE_PRODUCT: &str = r"
    UPDATE card_template
    SET product_ids = array_remove(product_ids, $2), updated_at = now()
    WHERE id = $1
    RETURNING id, background_url, sticker_url, product_ids, created_at, updated_at
";

/// Fields for inserting a template.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub id: TemplateId,
    pub background_url: String,
    pub sticker_url: String,
    pub product_ids: Vec<String>,
}

/// Repository for card template database operations.
pub struct TemplateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TemplateRepository<'a> {
    /// Create a new template repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All templates, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Template>, RepositoryError> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {COLUMNS} FROM card_template ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Template::from).collect())
    }

    /// Get a template by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: TemplateId) -> Result<Option<Template>, RepositoryError> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {COLUMNS} FROM card_template WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Template::from))
    }

    /// The first template (oldest) assigned to a listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_for_listing(
        &self,
        listing_id: &str,
    ) -> Result<Option<Template>, RepositoryError> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {COLUMNS} FROM card_template WHERE $1 = ANY(product_ids) \
             ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(listing_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Template::from))
    }

    /// Insert a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, template: &NewTemplate) -> Result<Template, RepositoryError> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "INSERT INTO card_template (id, background_url, sticker_url, product_ids) \
             VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        ))
        .bind(template.id)
        .bind(&template.background_url)
        .bind(&template.sticker_url)
        .bind(&template.product_ids)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Delete a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no template had that ID.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: TemplateId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM card_template WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Move a listing between templates in one transaction.
    ///
    /// Removes `product_id` from `old` (if given), then adds it to `new`
    /// (if given). Returns the updated new template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` (and rolls back) if `new` does not exist.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn reassign_product(
        &self,
        product_id: &str,
        old: Option<TemplateId>,
        new: Option<TemplateId>,
    ) -> Result<Option<Template>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(old) = old {
            sqlx::query_as::<_, TemplateRow>(REMOVE_PRODUCT)
                .bind(old)
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;
        }

        let updated = match new {
            Some(new) => {
                let row = sqlx::query_as::<_, TemplateRow>(ADD_PRODUCT)
                    .bind(new)
                    .bind(product_id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
                Some(Template::from(row))
            }
            None => None,
        };

        tx.commit().await?;
        Ok(updated)
    }
}
