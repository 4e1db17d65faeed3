//! Handlers for `/directory` endpoints. All require authentication.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/directory` | The caller's directories |
//! | `POST`   | `/directory` | Body: `{"name"}` |
//! | `PUT`    | `/directory/{id}` | Rename. Body: `{"name"}`; owner only |
//! | `DELETE` | `/directory/{id}` | Owner only; filed Tils keep a dangling reference |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use til_core::{
  directory::{Directory, NewDirectory},
  store::TilStore,
};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

/// `GET /directory`
pub async fn list<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<Vec<Directory>>, ApiError> {
  let directories = state
    .store
    .list_directories(caller.user.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(directories))
}

#[derive(Debug, Deserialize)]
pub struct NameBody {
  pub name: String,
}

fn directory_name(body: &NameBody) -> Result<String, ApiError> {
  let name = body.name.trim();
  if name.is_empty() {
    return Err(ApiError::BadRequest("directory name must not be empty".into()));
  }
  Ok(name.to_owned())
}

/// Fetch a directory the caller owns: 404 if missing, 403 if foreign.
async fn owned_directory<S: TilStore>(
  store: &S,
  id: Uuid,
  owner: Uuid,
) -> Result<Directory, ApiError> {
  let directory = store
    .get_directory(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("directory {id} not found")))?;
  if directory.uid != owner {
    return Err(ApiError::Forbidden("not your directory".into()));
  }
  Ok(directory)
}

/// `POST /directory`
pub async fn create<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Json(body): Json<NameBody>,
) -> Result<impl IntoResponse, ApiError> {
  let name = directory_name(&body)?;
  let directory = state
    .store
    .add_directory(NewDirectory { uid: caller.user.user_id, name })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(directory)))
}

/// `PUT /directory/{id}`
pub async fn rename_one<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
  Json(body): Json<NameBody>,
) -> Result<Json<Directory>, ApiError> {
  let name = directory_name(&body)?;
  owned_directory(state.store.as_ref(), id, caller.user.user_id).await?;
  let directory = state
    .store
    .rename_directory(id, name)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("directory {id} not found")))?;
  Ok(Json(directory))
}

/// `DELETE /directory/{id}`
pub async fn delete_one<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  owned_directory(state.store.as_ref(), id, caller.user.user_id).await?;
  state.store.delete_directory(id).await.map_err(ApiError::store)?;
  tracing::debug!(directory_id = %id, "directory deleted");
  Ok(StatusCode::NO_CONTENT)
}
