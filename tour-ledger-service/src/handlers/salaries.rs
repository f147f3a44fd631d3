use crate::dtos::{ProfileListParams, ReconcileRequest};
use crate::models::{ActingUser, SalaryProfileInput};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

pub async fn list_profiles(
    State(state): State<AppState>,
    _user: ActingUser,
    Query(params): Query<ProfileListParams>,
) -> Result<impl IntoResponse, AppError> {
    let profiles = state
        .profiles
        .list(params.active_only.unwrap_or(false))
        .await?;
    Ok(Json(profiles))
}

pub async fn upsert_profile(
    State(state): State<AppState>,
    user: ActingUser,
    Json(input): Json<SalaryProfileInput>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.profiles.upsert(&user, input).await?;
    Ok(Json(profile))
}

pub async fn deactivate_profile(
    State(state): State<AppState>,
    user: ActingUser,
    Path(profile_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.profiles.deactivate(&user, profile_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reconcile(
    State(state): State<AppState>,
    user: ActingUser,
    Json(request): Json<ReconcileRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.profiles.authorize(&user)?;
    let period = request.period()?;
    let report = state.reconciler.reconcile_active(period).await?;
    Ok(Json(report))
}
