//! Etsy shop connection, listings, and webhook routes.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::etsy::webhook::{self, WebhookHeaders};
use crate::etsy::{EtsyError, Listing, ShopSection, WebhookRegistration};
use crate::extract::blank_as_none;
use crate::middleware::RequireAdminAuth;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Event subscribed to when no event name is given.
pub const DEFAULT_WEBHOOK_EVENT: &str = "order.paid";

#[derive(Debug, Serialize)]
pub struct AuthUrlResponse {
    pub url: String,
}

/// Where to send the admin next.
///
/// With a working connection that is the designs page; otherwise a fresh
/// Etsy consent URL.
pub async fn initiate_auth(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<Json<AuthUrlResponse>> {
    let etsy = state.etsy();

    if etsy.connection().await?.is_some() {
        match etsy.valid_connection().await {
            Ok(connection) => {
                tracing::debug!(shop_id = connection.shop_id, "Etsy already connected");
                return Ok(Json(AuthUrlResponse {
                    url: designs_url(&state),
                }));
            }
            Err(e) => tracing::warn!(error = %e, "Stored Etsy connection unusable, reconnecting"),
        }
    }

    let pkce = state.pending_auth().begin().await;
    let url = etsy.authorization_url(&pkce)?;
    Ok(Json(AuthUrlResponse { url }))
}

fn designs_url(state: &AppState) -> String {
    format!("{}/designs", state.config().frontend_url.trim_end_matches('/'))
}

#[derive(Debug, Deserialize)]
pub struct OAuthRedirectQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// OAuth redirect target: finish the connection and return to the frontend.
pub async fn oauth_redirect(
    State(state): State<AppState>,
    Query(query): Query<OAuthRedirectQuery>,
) -> Result<Redirect> {
    if let Some(error) = query.error {
        tracing::warn!(error = %error, description = ?query.error_description, "Etsy authorization denied");
        return Err(AppError::BadRequest(format!("Etsy authorization failed: {error}")));
    }

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Err(AppError::BadRequest("Missing code or state".to_string()));
    };

    let verifier = state
        .pending_auth()
        .take(&oauth_state)
        .await
        .ok_or_else(|| AppError::BadRequest("Invalid or expired OAuth state".to_string()))?;

    state.etsy().connect(&code, &verifier).await?;

    Ok(Redirect::to(&designs_url(&state)))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
}

/// Force a token refresh.
pub async fn refresh_token(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>> {
    state.etsy().refresh().await.map_err(|e| match e {
        EtsyError::NotConnected => AppError::Unauthorized("No refresh token found".to_string()),
        other => AppError::Etsy(other),
    })?;
    Ok(Json(RefreshResponse { success: true }))
}

#[derive(Debug, Serialize)]
pub struct ListingsResponse {
    pub status: &'static str,
    pub products: Vec<Listing>,
}

/// Scratch card listings: the configured section, or every active listing.
pub async fn listings(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<Json<ListingsResponse>> {
    let etsy = state.etsy();
    let shop_id = etsy.require_connection().await?.shop_id;

    let products = match state.config().etsy.section_id {
        Some(section_id) => etsy
            .section_listings(shop_id, section_id)
            .await?
            .ok_or_else(|| AppError::BadRequest("No listings found".to_string()))?,
        None => etsy.active_listings(shop_id).await?,
    };

    Ok(Json(ListingsResponse {
        status: "success",
        products,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDebug {
    pub shop_id: i64,
    pub sections: Vec<ShopSection>,
    pub configured_section_id: Option<i64>,
    pub section_found: bool,
}

/// Shop sections and whether the configured one exists.
pub async fn debug_listings(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<ApiResponse<SectionDebug>> {
    let etsy = state.etsy();
    let shop_id = etsy.require_connection().await?.shop_id;
    let sections = etsy.shop_sections(shop_id).await?;
    let configured_section_id = state.config().etsy.section_id;
    let section_found = configured_section_id
        .is_some_and(|id| sections.iter().any(|s| s.shop_section_id == id));

    Ok(ApiResponse::success(
        SectionDebug {
            shop_id,
            sections,
            configured_section_id,
            section_found,
        },
        "Shop sections retrieved",
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateWebhookRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub event_name: Option<String>,
}

/// Subscribe the shop to a webhook event.
pub async fn create_webhook(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ApiResponse<WebhookRegistration>> {
    let request: CreateWebhookRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateWebhookRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    let event_name = request
        .event_name
        .unwrap_or_else(|| DEFAULT_WEBHOOK_EVENT.to_string());

    let etsy = state.etsy();
    let shop_id = etsy.require_connection().await?.shop_id;
    let registration = etsy
        .create_webhook(shop_id, &event_name, &state.config().etsy.webhook_callback_url)
        .await?;

    tracing::info!(shop_id, event_name = %event_name, "Etsy webhook created");
    Ok(ApiResponse::success(registration, "Webhook created"))
}

/// Incoming Etsy webhook delivery.
///
/// Verified against `ETSY_WEBHOOK_SECRET` when set. Any verified delivery
/// triggers an order ingestion run.
pub async fn webhook_received(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    if let Some(secret) = &state.config().etsy.webhook_secret {
        let now = chrono::Utc::now().timestamp();
        webhook::verify(secret, WebhookHeaders::from_header_map(&headers), &body, now).map_err(
            |e| {
                tracing::warn!(error = %e, "Rejected webhook delivery");
                AppError::Unauthorized("Invalid webhook signature".to_string())
            },
        )?;
    }

    let event = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("event_type").or_else(|| v.get("type")).cloned());
    tracing::info!(event = ?event, size = body.len(), "Etsy webhook received");

    state.orders().trigger();

    Ok((StatusCode::OK, "Webhook received"))
}
