//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                   - Liveness
//! GET  /health/ready                             - Readiness (database ping)
//!
//! # Admin auth
//! POST /api/auth/admin/register                  - Create admin account
//! POST /api/auth/admin/login                     - Start session
//! POST /api/auth/admin/logout                    - End session (admin)
//! GET  /api/auth/admin/me                        - Current admin (admin)
//!
//! # Etsy
//! GET  /api/etsy/auth                            - Consent URL (admin)
//! GET  /api/etsy/auth/oauth/redirect             - OAuth callback
//! POST /api/etsy/auth/refresh-token              - Force token refresh (admin)
//! GET  /api/etsy/listings                        - Scratch card listings (admin)
//! GET  /api/etsy/debug-listings                  - Shop sections (admin)
//! POST /api/etsy/create-etsy-webhook             - Subscribe to events (admin)
//! POST /api/etsy/etsy-webhook                    - Etsy webhook delivery
//!
//! # Templates (admin)
//! POST /api/template/upload                      - Upload images (multipart)
//! GET  /api/template/all                         - All templates
//! POST /api/template/delete-template             - Delete a template
//! POST /api/template/selectedTemplate            - Reassign a listing
//! GET  /api/template/single-template/{templateId} - One template
//!
//! # Cards (public)
//! POST /api/custom/update-custom-card            - Save customization
//! GET  /api/custom/single-card/{cardId}          - Card for customization
//! GET  /api/custom/scratch-card/{cardId}         - Card for reveal
//! ```

pub mod auth;
pub mod cards;
pub mod etsy;
pub mod health;
pub mod templates;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Largest accepted template upload (both images together).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Create the admin auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .merge(limited)
}

/// Create the Etsy routes router.
pub fn etsy_routes() -> Router<AppState> {
    Router::new()
        .route("/auth", get(etsy::initiate_auth))
        .route("/auth/oauth/redirect", get(etsy::oauth_redirect))
        .route("/auth/refresh-token", post(etsy::refresh_token))
        .route("/listings", get(etsy::listings))
        .route("/debug-listings", get(etsy::debug_listings))
        .route("/create-etsy-webhook", post(etsy::create_webhook))
        .route("/etsy-webhook", post(etsy::webhook_received))
}

/// Create the template routes router.
pub fn template_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(templates::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/all", get(templates::list))
        .route("/delete-template", post(templates::delete))
        .route("/selectedTemplate", post(templates::select))
        .route("/single-template/{template_id}", get(templates::single))
}

/// Create the customer card routes router.
pub fn card_routes() -> Router<AppState> {
    Router::new()
        .route("/update-custom-card", post(cards::customize))
        .route("/single-card/{card_id}", get(cards::single_card))
        .route("/scratch-card/{card_id}", get(cards::scratch_card))
}

/// All `/api` routes, behind the general rate limiter.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth/admin", auth_routes())
        .nest("/etsy", etsy_routes())
        .nest("/template", template_routes())
        .nest("/custom", card_routes())
        .layer(api_rate_limiter())
}

/// Create the complete router (without outer middleware).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes())
}
