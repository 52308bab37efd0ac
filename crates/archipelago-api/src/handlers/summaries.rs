//! `/api/v1/summaries`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use archipelago_core::Summary;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::services::SaveSummary;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RenameSummaryBody {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TextRoleBody {
    pub text_with_role: String,
    pub role: String,
}

pub async fn save_summary(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Json(body): Json<SaveSummary>,
) -> ApiResult<Json<Summary>> {
    Ok(Json(state.summaries.save_text(body).await?))
}

pub async fn list_active(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> ApiResult<Json<Vec<Summary>>> {
    Ok(Json(state.summaries.list_active().await?))
}

pub async fn get_summary(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Summary>> {
    Ok(Json(state.summaries.get(id).await?))
}

pub async fn rename_summary(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RenameSummaryBody>,
) -> ApiResult<StatusCode> {
    state.summaries.update_name(id, &body.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_text_role(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<TextRoleBody>,
) -> ApiResult<StatusCode> {
    state
        .summaries
        .update_text_role(id, &body.text_with_role, &body.role)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn finish_summary(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.summaries.finish(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
