use crate::dtos::{
    AttachmentListResponse, AttachmentResponse, DeleteAttachmentRequest,
    UploadAttachmentResponse,
};
use crate::ledger::{AttachmentRemoval, AttachmentUpload};
use crate::models::{ActingUser, AttachmentType};
use crate::startup::AppState;
use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::str::FromStr;
use uuid::Uuid;

fn multipart_error(e: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
}

async fn text_field(field: Field<'_>) -> Result<Option<String>, AppError> {
    let value = field.text().await.map_err(multipart_error)?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

fn parse_decimal(name: &str, raw: Option<String>) -> Result<Option<Decimal>, AppError> {
    raw.map(|v| {
        Decimal::from_str(&v)
            .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid {}: {}", name, v)))
    })
    .transpose()
}

/// Multipart upload; `file` and `attachment_type` are required.
pub async fn upload_attachment(
    State(state): State<AppState>,
    user: ActingUser,
    Path(booking_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut custom_name = None;
    let mut attachment_type = None;
    let mut amount = None;
    let mut original_currency = None;
    let mut original_amount = None;
    let mut context = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("unnamed").to_string();
                let data = field.bytes().await.map_err(multipart_error)?.to_vec();
                if data.len() > state.max_upload_bytes {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "File too large (max {} bytes)",
                        state.max_upload_bytes
                    )));
                }
                file = Some((file_name, data));
            }
            "custom_name" => custom_name = text_field(field).await?,
            "attachment_type" => attachment_type = text_field(field).await?,
            "amount" => amount = text_field(field).await?,
            "original_currency" => original_currency = text_field(field).await?,
            "original_amount" => original_amount = text_field(field).await?,
            "context" => context = text_field(field).await?,
            other => tracing::debug!(field = %other, "Ignoring unknown multipart field"),
        }
    }

    let (file_name, data) =
        file.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No file uploaded")))?;
    let attachment_type = attachment_type
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("attachment_type is required")))?
        .parse::<AttachmentType>()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    let upload = AttachmentUpload {
        booking_id,
        file_name,
        custom_name,
        data,
        attachment_type,
        amount: parse_decimal("amount", amount)?,
        original_currency,
        original_amount: parse_decimal("original_amount", original_amount)?,
        context,
    };

    let bound = state.binder.bind(&user, upload).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadAttachmentResponse::from(bound)),
    ))
}

pub async fn list_attachments(
    State(state): State<AppState>,
    _user: ActingUser,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let attachments: Vec<AttachmentResponse> = state
        .store
        .list_attachments(booking_id)
        .await?
        .into_iter()
        .map(AttachmentResponse::from)
        .collect();

    Ok(Json(AttachmentListResponse {
        total: attachments.len(),
        attachments,
    }))
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    user: ActingUser,
    Path((booking_id, attachment_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<DeleteAttachmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let removal = AttachmentRemoval {
        attachment_id,
        booking_id,
        file_path: request.file_path,
        attachment_type: request.attachment_type,
        file_name: request.file_name,
    };

    let report = state.unbinder.unbind(&user, removal).await?;
    Ok(Json(report))
}
