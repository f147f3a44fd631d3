use crate::dtos::{
    AssignCodeRequest, CodePreviewParams, ConfirmationCodeResponse, InvoiceAmountsResponse,
};
use crate::models::ActingUser;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

pub async fn rebuild_invoice_amounts(
    State(state): State<AppState>,
    user: ActingUser,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(user_id = %user.id, booking_id = %booking_id, "Invoice index rebuild requested");
    let index = state.invoice_index.rebuild(booking_id).await?;

    Ok(Json(InvoiceAmountsResponse {
        booking_id,
        total: index.total(),
        invoice_amounts: index,
    }))
}

pub async fn assign_confirmation_code(
    State(state): State<AppState>,
    _user: ActingUser,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<AssignCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let code = state
        .allocator
        .assign(booking_id, request.arrival_date)
        .await?;

    Ok(Json(ConfirmationCodeResponse {
        booking_id: Some(booking_id),
        confirmation_code: code,
    }))
}

pub async fn preview_confirmation_code(
    State(state): State<AppState>,
    _user: ActingUser,
    Query(params): Query<CodePreviewParams>,
) -> Result<impl IntoResponse, AppError> {
    let code = state
        .allocator
        .preview(params.arrival_date, params.exclude)
        .await?;

    Ok(Json(ConfirmationCodeResponse {
        booking_id: params.exclude,
        confirmation_code: code,
    }))
}
