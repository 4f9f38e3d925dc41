//! Order ingestion: turns new Etsy order lines into scratch cards.
//!
//! A cron job polls the shop's recent receipts; the webhook endpoint can also
//! trigger a run. For every line item of an eligible listing that has no card
//! yet, a card is issued and the buyer is emailed a customization link.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use scratchcard_core::CardId;

use crate::db::{CardRepository, RepositoryError};
use crate::etsy::{EtsyClient, EtsyError, Receipt};
use crate::models::NewCard;
use crate::services::email::EmailService;

/// Number of receipts fetched per run.
pub const RECEIPT_BATCH_SIZE: usize = 25;

/// Maximum number of unsent customization links emailed per run.
pub const PENDING_LINK_BATCH_SIZE: i64 = 50;

/// Errors from a single ingestion run.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("etsy error: {0}")]
    Etsy(#[from] EtsyError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Outcome of one ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub receipts: usize,
    pub cards_issued: usize,
    pub emails_sent: usize,
}

/// A line item that should receive a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLine {
    pub receipt_id: i64,
    pub transaction_id: i64,
    pub listing_id: i64,
    pub buyer_email: Option<String>,
}

/// Pick the line items of new receipts that belong to eligible listings.
///
/// Returns the lines and the highest receipt ID seen (the next cursor).
#[must_use]
pub fn select_new_lines(
    receipts: &[Receipt],
    cursor: Option<i64>,
    eligible: &HashSet<i64>,
) -> (Vec<PendingLine>, Option<i64>) {
    let mut lines = Vec::new();
    let mut next_cursor = cursor;

    for receipt in receipts {
        if cursor.is_some_and(|c| receipt.receipt_id <= c) {
            continue;
        }
        next_cursor = Some(next_cursor.map_or(receipt.receipt_id, |c| c.max(receipt.receipt_id)));

        let buyer_email = receipt
            .buyer_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(String::from);

        for tx in &receipt.transactions {
            let Some(listing_id) = tx.listing_id else {
                continue;
            };
            if eligible.contains(&listing_id) {
                lines.push(PendingLine {
                    receipt_id: receipt.receipt_id,
                    transaction_id: tx.transaction_id,
                    listing_id,
                    buyer_email: buyer_email.clone(),
                });
            }
        }
    }

    (lines, next_cursor)
}

/// Link a customer follows to customize a card.
#[must_use]
pub fn customize_link(frontend_url: &str, card_id: CardId) -> String {
    format!("{}/customize-card/{card_id}", frontend_url.trim_end_matches('/'))
}

/// Polls Etsy for new orders and issues scratch cards.
#[derive(Clone)]
pub struct OrderPoller {
    inner: Arc<OrderPollerInner>,
}

struct OrderPollerInner {
    pool: PgPool,
    etsy: EtsyClient,
    email: Option<EmailService>,
    frontend_url: String,
    section_id: Option<i64>,
    /// Highest processed receipt ID. Held for the duration of a run.
    cursor: Mutex<Option<i64>>,
}

impl OrderPoller {
    /// Create a new poller.
    #[must_use]
    pub fn new(
        pool: PgPool,
        etsy: EtsyClient,
        email: Option<EmailService>,
        frontend_url: String,
        section_id: Option<i64>,
    ) -> Self {
        Self {
            inner: Arc::new(OrderPollerInner {
                pool,
                etsy,
                email,
                frontend_url,
                section_id,
                cursor: Mutex::new(None),
            }),
        }
    }

    /// Run once in the background, unless a run is already in progress.
    pub fn trigger(&self) {
        let poller = self.clone();
        tokio::spawn(async move {
            poller.run_logged().await;
        });
    }

    async fn run_logged(&self) {
        match self.run_once().await {
            Ok(Some(summary)) if summary.cards_issued > 0 || summary.emails_sent > 0 => {
                tracing::info!(
                    receipts = summary.receipts,
                    cards_issued = summary.cards_issued,
                    emails_sent = summary.emails_sent,
                    "Order ingestion run finished"
                );
            }
            Ok(Some(summary)) => {
                tracing::debug!(receipts = summary.receipts, "No new scratch card orders");
            }
            Ok(None) => tracing::debug!("Order ingestion already running, skipped"),
            Err(e) => tracing::error!(error = %e, "Order ingestion failed"),
        }
    }

    /// Process new receipts once, then email any links still unsent.
    ///
    /// Returns `None` if another run holds the cursor.
    ///
    /// # Errors
    ///
    /// Returns an `OrderError` if the Etsy API or database fails. The cursor
    /// only advances once every new line has a card.
    pub async fn run_once(&self) -> Result<Option<RunSummary>, OrderError> {
        let Ok(mut cursor) = self.inner.cursor.try_lock() else {
            return Ok(None);
        };

        let Some(connection) = self.inner.etsy.connection().await? else {
            tracing::info!("No Etsy shop connected, skipping order ingestion");
            return Ok(Some(RunSummary::default()));
        };
        let shop_id = connection.shop_id;

        let mut summary = RunSummary::default();

        let eligible = self.eligible_listing_ids(shop_id).await?;
        if eligible.is_empty() {
            tracing::debug!(shop_id, "No eligible listings");
        } else {
            let receipts = self
                .inner
                .etsy
                .recent_receipts(shop_id, RECEIPT_BATCH_SIZE)
                .await?;
            let (lines, next_cursor) = select_new_lines(&receipts, *cursor, &eligible);

            summary.receipts = receipts.len();
            for line in lines {
                if self.issue_card(&line).await? {
                    summary.cards_issued += 1;
                }
            }
            *cursor = next_cursor;
        }

        summary.emails_sent = self.send_pending_links().await?;
        Ok(Some(summary))
    }

    async fn eligible_listing_ids(&self, shop_id: i64) -> Result<HashSet<i64>, EtsyError> {
        let listings = match self.inner.section_id {
            Some(section_id) => self
                .inner
                .etsy
                .section_listings(shop_id, section_id)
                .await?
                .unwrap_or_default(),
            None => self.inner.etsy.active_listings(shop_id).await?,
        };
        Ok(listings.into_iter().map(|l| l.listing_id).collect())
    }

    /// Issue a card for one line. Returns false if it already had one.
    async fn issue_card(&self, line: &PendingLine) -> Result<bool, OrderError> {
        let cards = CardRepository::new(&self.inner.pool);
        if cards.exists_for_transaction(line.transaction_id).await? {
            return Ok(false);
        }

        let new_card = NewCard::for_order(
            line.transaction_id,
            line.receipt_id,
            line.listing_id,
            line.buyer_email.clone(),
            Utc::now(),
        );
        let card = match cards.create(&new_card).await {
            Ok(card) => card,
            Err(RepositoryError::Conflict(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            card_id = %card.id,
            receipt_id = line.receipt_id,
            transaction_id = line.transaction_id,
            "Scratch card issued"
        );
        if card.customer_email.is_none() {
            tracing::warn!(card_id = %card.id, "Receipt has no buyer email, link not sent");
        }
        Ok(true)
    }

    /// Email the customization link for every open card that has not had
    /// one delivered. A card is only marked sent after the send succeeds, so
    /// failures are retried on the next run until the card expires.
    async fn send_pending_links(&self) -> Result<usize, OrderError> {
        let Some(email) = &self.inner.email else {
            return Ok(0);
        };

        let cards = CardRepository::new(&self.inner.pool);
        let pending = cards.pending_links(Utc::now(), PENDING_LINK_BATCH_SIZE).await?;

        let mut sent = 0;
        for card in pending {
            let Some(to) = card.customer_email.as_deref() else {
                continue;
            };
            let link = customize_link(&self.inner.frontend_url, card.id);
            match email.send_scratch_card_link(to, &link).await {
                Ok(()) => {
                    cards.mark_link_sent(card.id).await?;
                    sent += 1;
                }
                Err(e) => tracing::error!(
                    card_id = %card.id,
                    error = %e,
                    "Failed to email scratch card link, will retry"
                ),
            }
        }
        Ok(sent)
    }
}

/// Start the cron job that polls for new orders.
///
/// # Errors
///
/// Returns an error if the schedule is invalid or the scheduler fails to start.
pub async fn start_scheduler(
    poller: OrderPoller,
    schedule: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let poller = poller.clone();
        Box::pin(async move {
            poller.run_logged().await;
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(schedule = %schedule, "Order poll scheduler started");
    Ok(scheduler)
}
