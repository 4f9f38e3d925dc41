//! Admin account routes.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use scratchcard_core::AdminUserId;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::extract::{ApiJson, blank_as_none};
use crate::middleware::{RequireAdminAuth, clear_current_admin, set_current_admin};
use crate::models::{AdminUser, CurrentAdmin};
use crate::response::ApiResponse;
use crate::services::auth::AuthService;
use crate::state::AppState;

const MISSING_CREDENTIALS: &str = "Please provide username and password";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminSummary {
    pub id: AdminUserId,
    pub username: String,
}

impl From<&AdminUser> for AdminSummary {
    fn from(admin: &AdminUser) -> Self {
        Self {
            id: admin.id,
            username: admin.username.to_string(),
        }
    }
}

impl From<CurrentAdmin> for AdminSummary {
    fn from(admin: CurrentAdmin) -> Self {
        Self {
            id: admin.id,
            username: admin.username,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub user: AdminSummary,
}

fn credentials(username: Option<String>, password: Option<String>) -> Result<(String, String)> {
    match (username, password) {
        (Some(u), Some(p)) if !p.is_empty() => Ok((u, p)),
        _ => Err(AppError::BadRequest(MISSING_CREDENTIALS.to_string())),
    }
}

/// Create an admin account.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let (username, password) = credentials(body.username, body.password)?;

    let admin = AuthService::new(state.pool())
        .register(
            &username,
            &password,
            body.email.as_deref(),
            state.config().allow_admin_registration,
        )
        .await?;

    tracing::info!(admin_id = %admin.id, username = %admin.username, "Admin registered");

    Ok((
        StatusCode::CREATED,
        axum::Json(AuthResponse {
            status: "success",
            message: Some("User registered successfully"),
            user: AdminSummary::from(&admin),
        }),
    ))
}

/// Start an admin session.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let (username, password) = credentials(body.username, body.password)?;

    let admin = AuthService::new(state.pool())
        .login(&username, &password)
        .await
        .inspect_err(|e| tracing::info!(username = %username, error = %e, "Admin login failed"))?;

    set_current_admin(&session, &CurrentAdmin::from(&admin))
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(&admin.id, admin.username.as_str());

    tracing::info!(admin_id = %admin.id, "Admin logged in");

    Ok(axum::Json(AuthResponse {
        status: "success",
        message: None,
        user: AdminSummary::from(&admin),
    }))
}

/// End the admin session.
pub async fn logout(
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
) -> Result<ApiResponse<()>> {
    clear_current_admin(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();

    tracing::info!(admin_id = %admin.id, "Admin logged out");
    Ok(ApiResponse::message("Logged out successfully"))
}

/// The logged-in admin.
pub async fn me(RequireAdminAuth(admin): RequireAdminAuth) -> impl IntoResponse {
    axum::Json(AuthResponse {
        status: "success",
        message: None,
        user: admin.into(),
    })
}
