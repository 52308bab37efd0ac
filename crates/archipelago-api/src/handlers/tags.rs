//! Tag routes: per-note tags under `/api/v1/notes/:id/tags`, tag-level
//! routes under `/api/v1/tags`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use archipelago_core::{LinkedTag, Tag};

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TagNameBody {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkTagsBody {
    pub tag_id: Uuid,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestBody {
    pub text: String,
    /// Zero or absent uses the configured default.
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClosestQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct UnlinkResponse {
    pub tag_deleted: bool,
}

// ─── Note tags ─────────────────────────────────────────────────────────────

pub async fn list_note_tags(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(note_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(state.tags.tags_for_note(user, note_id).await?))
}

pub async fn add_note_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(note_id): Path<Uuid>,
    Json(body): Json<TagNameBody>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    let tag = state.tags.create_and_link(user, note_id, &body.name).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn link_note_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((note_id, tag_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.tags.link_to_note(user, note_id, tag_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rename_note_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((note_id, tag_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<TagNameBody>,
) -> ApiResult<Json<Tag>> {
    Ok(Json(
        state
            .tags
            .rename_for_note(user, note_id, tag_id, &body.name)
            .await?,
    ))
}

pub async fn unlink_note_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((note_id, tag_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<UnlinkResponse>> {
    let tag_deleted = state.tags.unlink_from_note(user, note_id, tag_id).await?;
    Ok(Json(UnlinkResponse { tag_deleted }))
}

// ─── Tags ──────────────────────────────────────────────────────────────────

pub async fn get_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Tag>> {
    Ok(Json(state.tags.get(user, id).await?))
}

pub async fn update_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<TagNameBody>,
) -> ApiResult<Json<Tag>> {
    Ok(Json(state.tags.update_tag(user, id, &body.name).await?))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.tags.delete_tag(user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_tag_notes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Uuid>>> {
    Ok(Json(state.tags.notes_for_tag(user, id).await?))
}

pub async fn list_linked_tags(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<LinkedTag>>> {
    Ok(Json(state.tags.linked_tags(user, id).await?))
}

pub async fn link_tags(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<LinkTagsBody>,
) -> ApiResult<StatusCode> {
    state
        .tags
        .link_tags(user, id, body.tag_id, body.label.as_deref())
        .await?;
    Ok(StatusCode::CREATED)
}

pub async fn unlink_tags(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, other_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.tags.unlink_tags(user, id, other_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn closest_tags(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ClosestQuery>,
) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(state.tags.closest_tags(user, id, query.limit).await?))
}

pub async fn suggest_tags(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<SuggestBody>,
) -> ApiResult<Json<SuggestResponse>> {
    let tags = state.tags.suggest_tags(user, &body.text, body.count).await?;
    Ok(Json(SuggestResponse { tags }))
}
