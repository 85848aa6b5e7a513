use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::engine::attachments::{self, NewUpload, Owner};
use crate::engine::EntityKind;
use crate::error::{AppError, AppResult};
use crate::models::Attachment;
use crate::state::AppState;

use super::to_iso;

#[derive(Serialize)]
pub struct AttachmentResponse {
    pub id: Uuid,
    pub storage_path: String,
    pub original_name: String,
    pub mime_type: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
    pub created_by: Option<Uuid>,
}

impl From<Attachment> for AttachmentResponse {
    fn from(attachment: Attachment) -> Self {
        Self {
            id: attachment.id,
            storage_path: attachment.storage_path,
            original_name: attachment.original_name,
            mime_type: attachment.mime_type,
            description: attachment.description,
            created_at: to_iso(attachment.created_at),
            created_by: attachment.created_by,
        }
    }
}

#[derive(Deserialize)]
pub struct RemoveAttachmentsRequest {
    pub attachment_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct RemoveAttachmentsResponse {
    pub removed: usize,
}

#[derive(Deserialize)]
pub struct SignedUrlQuery {
    /// Forces a download filename on the token. Defaults to the stored
    /// original name when present but empty.
    pub download_as: Option<String>,
}

#[derive(Serialize)]
pub struct SignedUrlResponse {
    pub url: String,
    pub expires_in: u64,
}

#[derive(Deserialize)]
pub struct UpdateDescriptionRequest {
    pub description: Option<String>,
}

/// Pulls file fields and an optional shared description out of a
/// multipart body. Filename and per-file content type come from the
/// multipart metadata, with a mime guess as fallback.
async fn collect_uploads(mut multipart: Multipart) -> AppResult<Vec<NewUpload>> {
    let mut uploads = Vec::new();
    let mut description: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") | Some("files") => {
                let original_name = field
                    .file_name()
                    .map(|n| n.to_string())
                    .ok_or_else(|| AppError::bad_request("file field needs a filename"))?;
                let mime_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .or_else(|| {
                        mime_guess::from_path(&original_name)
                            .first()
                            .map(|mime| mime.to_string())
                    });
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::bad_request(format!("failed to read file: {err}")))?
                    .to_vec();
                if bytes.is_empty() {
                    return Err(AppError::bad_request("file must not be empty"));
                }
                uploads.push(NewUpload {
                    bytes,
                    original_name,
                    mime_type,
                    description: None,
                });
            }
            Some("description") => {
                let value = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("invalid description: {err}"))
                })?;
                if !value.trim().is_empty() {
                    description = Some(value);
                }
            }
            _ => {}
        }
    }

    if uploads.is_empty() {
        return Err(AppError::bad_request("at least one file field is required"));
    }
    if let Some(description) = description {
        for upload in &mut uploads {
            upload.description = Some(description.clone());
        }
    }
    Ok(uploads)
}

async fn upload_for_owner(
    state: AppState,
    owner: Owner,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Vec<AttachmentResponse>>)> {
    let uploads = collect_uploads(multipart).await?;

    let mut conn = state.db()?;
    let created =
        attachments::add_attachments(&mut conn, state.storage.as_ref(), owner, uploads, None)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(created.into_iter().map(AttachmentResponse::from).collect()),
    ))
}

async fn remove_for_owner(
    state: AppState,
    owner: Owner,
    payload: RemoveAttachmentsRequest,
) -> AppResult<Json<RemoveAttachmentsResponse>> {
    let mut conn = state.db()?;
    let removed = attachments::remove_attachments(
        &mut conn,
        state.storage.as_ref(),
        owner,
        &payload.attachment_ids,
    )
    .await?;
    Ok(Json(RemoveAttachmentsResponse { removed }))
}

pub async fn upload_claim_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Vec<AttachmentResponse>>)> {
    upload_for_owner(state, Owner::new(EntityKind::Claim, id), multipart).await
}

pub async fn remove_claim_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RemoveAttachmentsRequest>,
) -> AppResult<Json<RemoveAttachmentsResponse>> {
    remove_for_owner(state, Owner::new(EntityKind::Claim, id), payload).await
}

pub async fn upload_defect_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Vec<AttachmentResponse>>)> {
    upload_for_owner(state, Owner::new(EntityKind::Defect, id), multipart).await
}

pub async fn remove_defect_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RemoveAttachmentsRequest>,
) -> AppResult<Json<RemoveAttachmentsResponse>> {
    remove_for_owner(state, Owner::new(EntityKind::Defect, id), payload).await
}

pub async fn upload_ticket_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Vec<AttachmentResponse>>)> {
    upload_for_owner(state, Owner::new(EntityKind::Ticket, id), multipart).await
}

pub async fn remove_ticket_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RemoveAttachmentsRequest>,
) -> AppResult<Json<RemoveAttachmentsResponse>> {
    remove_for_owner(state, Owner::new(EntityKind::Ticket, id), payload).await
}

pub async fn upload_letter_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Vec<AttachmentResponse>>)> {
    upload_for_owner(state, Owner::new(EntityKind::Letter, id), multipart).await
}

pub async fn remove_letter_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RemoveAttachmentsRequest>,
) -> AppResult<Json<RemoveAttachmentsResponse>> {
    remove_for_owner(state, Owner::new(EntityKind::Letter, id), payload).await
}

pub async fn upload_court_case_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Vec<AttachmentResponse>>)> {
    upload_for_owner(state, Owner::new(EntityKind::CourtCase, id), multipart).await
}

pub async fn remove_court_case_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RemoveAttachmentsRequest>,
) -> AppResult<Json<RemoveAttachmentsResponse>> {
    remove_for_owner(state, Owner::new(EntityKind::CourtCase, id), payload).await
}

pub async fn attachment_url(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
    Query(query): Query<SignedUrlQuery>,
) -> AppResult<Json<SignedUrlResponse>> {
    let mut conn = state.db()?;
    let attachment = attachments::load_attachment(&mut conn, attachment_id)?;
    drop(conn);

    let download_name = query
        .download_as
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(&attachment.original_name);

    let url = attachments::signed_url(
        state.storage.as_ref(),
        &attachment.storage_path,
        Some(download_name),
    )
    .await?;

    Ok(Json(SignedUrlResponse {
        url,
        expires_in: attachments::SIGNED_URL_TTL.as_secs(),
    }))
}

pub async fn attachment_preview_url(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
) -> AppResult<Json<SignedUrlResponse>> {
    let mut conn = state.db()?;
    let attachment = attachments::load_attachment(&mut conn, attachment_id)?;
    drop(conn);

    let url = attachments::preview_url(state.storage.as_ref(), &attachment.storage_path).await?;
    Ok(Json(SignedUrlResponse {
        url,
        expires_in: attachments::SIGNED_URL_TTL.as_secs(),
    }))
}

pub async fn update_attachment_description(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
    Json(payload): Json<UpdateDescriptionRequest>,
) -> AppResult<Json<AttachmentResponse>> {
    let mut conn = state.db()?;
    let updated =
        attachments::update_description(&mut conn, attachment_id, payload.description)?;
    Ok(Json(AttachmentResponse::from(updated)))
}
