//! Card template management (admin).

use axum::extract::{Multipart, Path, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use scratchcard_core::TemplateId;

use crate::db::templates::NewTemplate;
use crate::db::{RepositoryError, TemplateRepository};
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ListingRef, blank_as_none};
use crate::middleware::RequireAdminAuth;
use crate::models::Template;
use crate::models::template::normalize_product_ids;
use crate::response::ApiResponse;
use crate::services::storage::{StorageError, UploadFile, template_object_name};
use crate::state::AppState;

/// Parse a template ID from request input.
pub(crate) fn parse_template_id(raw: &str) -> Result<TemplateId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid template id".to_string()))
}

/// Fields of an upload form.
#[derive(Debug, Default)]
struct UploadForm {
    background: Option<UploadFile>,
    sticker: Option<UploadFile>,
    product_ids: Vec<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "background" | "sticker" => {
                let file_name = field.file_name().unwrap_or(name.as_str()).to_string();
                let content_type = field.content_type().map(String::from);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                if data.is_empty() {
                    continue;
                }
                let file = UploadFile {
                    file_name,
                    content_type,
                    data: data.to_vec(),
                };
                if name == "background" {
                    form.background = Some(file);
                } else {
                    form.sticker = Some(file);
                }
            }
            "productId" | "productIds" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                form.product_ids.extend(text.split(',').map(String::from));
            }
            other => tracing::debug!(field = %other, "Ignoring unknown upload field"),
        }
    }

    Ok(form)
}

/// Upload a background/sticker pair and create a template.
pub async fn upload(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<ApiResponse<Template>> {
    let form = read_upload_form(multipart).await?;

    let (Some(background), Some(sticker)) = (form.background, form.sticker) else {
        return Err(AppError::BadRequest(
            "Both images must be uploaded.".to_string(),
        ));
    };

    let storage = state
        .storage()
        .filter(|s| s.has_bucket())
        .ok_or(StorageError::BucketNotConfigured)?;

    let millis = Utc::now().timestamp_millis();
    let background_path = template_object_name("background", millis, &background.file_name);
    let sticker_path = template_object_name("sticker", millis, &sticker.file_name);

    let background_url = storage.upload(&background_path, background).await?;
    let sticker_url = storage.upload(&sticker_path, sticker).await?;

    let template = TemplateRepository::new(state.pool())
        .create(&NewTemplate {
            id: TemplateId::generate(),
            background_url,
            sticker_url,
            product_ids: normalize_product_ids(&form.product_ids),
        })
        .await?;

    tracing::info!(template_id = %template.id, admin_id = %admin.id, "Template uploaded");
    Ok(ApiResponse::success(
        template,
        "Template uploaded successfully!",
    ))
}

#[derive(Debug, Serialize)]
pub struct AllTemplates {
    pub alltemplates: Vec<Template>,
}

/// All templates, newest first.
pub async fn list(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<ApiResponse<AllTemplates>> {
    let alltemplates = TemplateRepository::new(state.pool()).list_all().await?;
    Ok(ApiResponse::success(
        AllTemplates { alltemplates },
        "Templates fetched successfully",
    ))
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub id: Option<String>,
}

/// Delete a template and, best-effort, its images.
pub async fn delete(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DeleteRequest>,
) -> Result<ApiResponse<()>> {
    let id = body
        .id
        .ok_or_else(|| AppError::BadRequest("Template id missing".to_string()))?;
    let id = parse_template_id(&id)?;

    let templates = TemplateRepository::new(state.pool());
    let template = templates
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Template not found".to_string()))?;

    remove_images(&state, &template).await;

    match templates.delete(id).await {
        Ok(()) | Err(RepositoryError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    tracing::info!(template_id = %id, admin_id = %admin.id, "Template deleted");
    Ok(ApiResponse::message("Template delete successfully"))
}

async fn remove_images(state: &AppState, template: &Template) {
    let Some(storage) = state.storage().filter(|s| s.has_bucket()) else {
        tracing::warn!(template_id = %template.id, "Storage not configured, images left in place");
        return;
    };

    let paths: Vec<String> = [&template.background_url, &template.sticker_url]
        .into_iter()
        .filter_map(|url| storage.object_path(url))
        .collect();

    if let Err(e) = storage.remove(&paths).await {
        tracing::warn!(template_id = %template.id, error = %e, "Failed to remove template images");
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    #[serde(default)]
    pub product_id: Option<ListingRef>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub new_template_id: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub old_template_id: Option<String>,
}

/// Move a listing from one template to another.
pub async fn select(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SelectRequest>,
) -> Result<ApiResponse<()>> {
    let product_id = body
        .product_id
        .filter(|p| !p.0.is_empty())
        .ok_or_else(|| AppError::BadRequest("Template ID or Product ID is missing".to_string()))?;
    let new = body.new_template_id.as_deref().map(parse_template_id).transpose()?;
    let old = body.old_template_id.as_deref().map(parse_template_id).transpose()?;

    match TemplateRepository::new(state.pool())
        .reassign_product(&product_id.0, old, new)
        .await
    {
        Ok(_) => {}
        Err(RepositoryError::NotFound) => {
            return Err(AppError::NotFound("New template not found".to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(product_id = %product_id.0, ?old, ?new, "Template selection updated");
    Ok(ApiResponse::message("Template updated successfully"))
}

/// One template by ID.
pub async fn single(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> Result<ApiResponse<Template>> {
    let id = parse_template_id(&template_id)?;
    let template = TemplateRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("No template found.".to_string()))?;

    Ok(ApiResponse::success(template, "Template fetched successfully"))
}
