//! Customer-facing scratch card routes.
//!
//! These are public: the card UUID in the emailed link is the credential.

use axum::extract::{Path, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use scratchcard_core::{CardId, CardSection, CardState, TemplateId};

use crate::db::{CardRepository, TemplateRepository};
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ListingRef, blank_as_none};
use crate::models::{CardTransaction, NewCard, Template};
use crate::response::ApiResponse;
use crate::routes::templates::parse_template_id;
use crate::state::AppState;

const EXPIRED_MESSAGE: &str = "Card customization period has expired. Please check the URL again.";

fn parse_card_id(raw: &str) -> Result<CardId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid card id".to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizeRequest {
    #[serde(default)]
    pub card_body: Option<CardSection>,
    #[serde(default)]
    pub card_header: Option<CardSection>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub custom_card_id: Option<String>,
    #[serde(default, rename = "listing_id")]
    pub listing_id: Option<ListingRef>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub template_id: Option<String>,
}

/// A card together with the template it renders with.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInfo {
    pub template_info: Option<Template>,
    pub custom_card_info: CardTransaction,
}

/// Save a customer's customization.
///
/// Completes an existing open card, or creates a new completed card when no
/// existing card is named.
pub async fn customize(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CustomizeRequest>,
) -> Result<ApiResponse<CardTransaction>> {
    let cards = CardRepository::new(state.pool());
    let now = Utc::now();
    let card_body = body.card_body.unwrap_or_default();
    let card_header = body.card_header.unwrap_or_default();

    if let Some(raw) = body.custom_card_id.as_deref() {
        let id = parse_card_id(raw)?;
        if let Some(card) = cards.get(id).await? {
            match card.state(now) {
                CardState::Completed => {
                    return Err(AppError::Conflict(
                        "This card has already been customized.".to_string(),
                    ));
                }
                CardState::Expired => return Err(AppError::Gone(EXPIRED_MESSAGE.to_string())),
                CardState::Open => {}
            }

            let card = cards
                .complete(id, &card_body, &card_header)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict("This card has already been customized.".to_string())
                })?;

            tracing::info!(card_id = %card.id, "Card customization completed");
            return Ok(ApiResponse::success(card, "Card customization is complete"));
        }
    }

    let listing_id = body
        .listing_id
        .filter(|l| !l.0.is_empty())
        .map(|l| {
            l.as_i64()
                .ok_or_else(|| AppError::BadRequest("Invalid listing id".to_string()))
        })
        .transpose()?;
    let template_id = body.template_id.as_deref().map(parse_template_id).transpose()?;

    let card = cards
        .create(&NewCard::customized(
            listing_id,
            template_id,
            card_body,
            card_header,
            now,
        ))
        .await?;

    tracing::info!(card_id = %card.id, "Custom card created");
    Ok(ApiResponse::success(card, "New custom card is created"))
}

/// Template a card renders with: by template ID when the card has no
/// listing, otherwise the template assigned to its listing.
async fn template_for(state: &AppState, card: &CardTransaction) -> Result<Option<Template>> {
    let templates = TemplateRepository::new(state.pool());
    let template = match (card.listing_id, card.template_id) {
        (Some(listing_id), _) => templates.find_for_listing(&listing_id.to_string()).await?,
        (None, Some(template_id)) => templates.get(template_id).await?,
        (None, None) => None,
    };
    Ok(template)
}

/// Either card details or, for a template ID, a template preview.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SingleCard {
    Card(Box<CardInfo>),
    Completed(Box<CardTransaction>),
    Template(Box<Template>),
}

/// Load a card for the customization page.
///
/// The ID may also be a template ID, which the admin UI uses to preview
/// a template.
pub async fn single_card(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
) -> Result<ApiResponse<SingleCard>> {
    let id = parse_card_id(&card_id)?;

    if let Some(card) = CardRepository::new(state.pool()).get(id).await? {
        return match card.state(Utc::now()) {
            CardState::Expired => Err(AppError::Gone(EXPIRED_MESSAGE.to_string())),
            CardState::Completed => Ok(ApiResponse::success(
                SingleCard::Completed(Box::new(card)),
                "This URL has already been used.",
            )),
            CardState::Open => {
                let template_info = template_for(&state, &card).await?;
                Ok(ApiResponse::success(
                    SingleCard::Card(Box::new(CardInfo {
                        template_info,
                        custom_card_info: card,
                    })),
                    "Card info retrieved successfully.",
                ))
            }
        };
    }

    let template = TemplateRepository::new(state.pool())
        .get(TemplateId::new(id.as_uuid()))
        .await?
        .ok_or_else(|| AppError::NotFound("Template card does not exist.".to_string()))?;

    Ok(ApiResponse::success(
        SingleCard::Template(Box::new(template)),
        "Template card info retrieved.",
    ))
}

/// Load a finished card for the reveal page.
pub async fn scratch_card(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
) -> Result<ApiResponse<CardInfo>> {
    let id = parse_card_id(&card_id)?;
    let cards = CardRepository::new(state.pool());

    let mut card = cards
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Scratch card not found".to_string()))?;

    if card.card_view_url.is_none() {
        let view_path = card.view_path();
        cards.set_view_url_if_missing(id, &view_path).await?;
        card.card_view_url = Some(view_path);
    }

    let template_info = template_for(&state, &card).await?;

    Ok(ApiResponse::success(
        CardInfo {
            template_info,
            custom_card_info: card,
        },
        "Card info retrieved successfully.",
    ))
}
