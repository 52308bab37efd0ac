//! `/api/v1/notes`, including sharing and note summaries.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use archipelago_core::{AccessLevel, AccessibleNote, Note, NoteAccessGrant, Summary, UpdateNoteRequest};

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::services::{CreateNote, NoteView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetAccessBody {
    pub access: AccessLevel,
}

#[derive(Debug, Serialize)]
pub struct UserAccessResponse {
    pub note_id: Uuid,
    pub user_id: Uuid,
    pub access: AccessLevel,
}

pub async fn list_notes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<AccessibleNote>>> {
    Ok(Json(state.notes.list(user).await?))
}

pub async fn create_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateNote>,
) -> ApiResult<(StatusCode, Json<Note>)> {
    let note = state.notes.create(user, body).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NoteView>> {
    Ok(Json(state.notes.get(user, id).await?))
}

pub async fn update_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateNoteRequest>,
) -> ApiResult<Json<Note>> {
    Ok(Json(state.notes.update(user, id, body).await?))
}

pub async fn delete_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.notes.delete(user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_access(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<NoteAccessGrant>>> {
    Ok(Json(state.notes.list_access(user, id).await?))
}

pub async fn get_user_access(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((note_id, target)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<UserAccessResponse>> {
    let access = state.notes.get_user_access(user, note_id, target).await?;
    Ok(Json(UserAccessResponse {
        note_id,
        user_id: target,
        access,
    }))
}

pub async fn set_user_access(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((note_id, target)): Path<(Uuid, Uuid)>,
    Json(body): Json<SetAccessBody>,
) -> ApiResult<StatusCode> {
    state
        .notes
        .set_user_access(user, note_id, target, body.access)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_user_access(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((note_id, target)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    if state.notes.remove_user_access(user, note_id, target).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

pub async fn list_summaries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Summary>>> {
    Ok(Json(state.summaries.list_for_note(user, id).await?))
}

pub async fn attach_summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((note_id, summary_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .summaries
        .attach_to_note(user, summary_id, note_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
