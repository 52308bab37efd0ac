//! `/api/v1/dirs`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use archipelago_core::{DirTree, Directory};

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDirBody {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RenameDirBody {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveDirBody {
    /// `null` moves the directory to the top level.
    pub parent_id: Option<i64>,
}

pub async fn list_roots(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> ApiResult<Json<Vec<Directory>>> {
    Ok(Json(state.dirs.list_roots().await?))
}

pub async fn create_dir(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateDirBody>,
) -> ApiResult<(StatusCode, Json<Directory>)> {
    let dir = state.dirs.create(user, &body.name, body.parent_id).await?;
    Ok((StatusCode::CREATED, Json(dir)))
}

pub async fn get_dir(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Directory>> {
    Ok(Json(state.dirs.get(id).await?))
}

pub async fn get_tree(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<DirTree>> {
    Ok(Json(state.dirs.tree(user, id).await?))
}

pub async fn rename_dir(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<RenameDirBody>,
) -> ApiResult<Json<Directory>> {
    Ok(Json(state.dirs.rename(id, &body.name).await?))
}

pub async fn move_dir(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<MoveDirBody>,
) -> ApiResult<Json<Directory>> {
    Ok(Json(state.dirs.move_to(user, id, body.parent_id).await?))
}

pub async fn delete_dir(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.dirs.delete(user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
