//! Handlers for `/til` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/til` | Body: `{"content","is_private"?,"directory"?}`; authenticated |
//! | `GET`    | `/til/{id}` | Private Tils are visible to their owner and admins only |
//! | `PUT`    | `/til/{id}` | Same body as `POST`; owner only; `created` is kept |
//! | `DELETE` | `/til/{id}` | Owner or admin |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use til_core::{
  store::TilStore,
  til::{NewTil, Til, TilEdit},
};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Authenticated, Viewer},
  error::ApiError,
};

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TilBody {
  pub content:    String,
  #[serde(default)]
  pub is_private: bool,
  pub directory:  Option<Uuid>,
}

/// Reject blank content and directories the owner does not hold.
async fn validate<S: TilStore>(
  store: &S,
  body: &TilBody,
  owner: Uuid,
) -> Result<(), ApiError> {
  if body.content.trim().is_empty() {
    return Err(ApiError::BadRequest("content must not be empty".into()));
  }
  if let Some(dir_id) = body.directory {
    let directory = store
      .get_directory(dir_id)
      .await
      .map_err(ApiError::store)?
      .ok_or_else(|| ApiError::BadRequest(format!("directory {dir_id} does not exist")))?;
    if directory.uid != owner {
      return Err(ApiError::Forbidden("not your directory".into()));
    }
  }
  Ok(())
}

/// `POST /til`
pub async fn create<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Json(body): Json<TilBody>,
) -> Result<impl IntoResponse, ApiError> {
  let owner = caller.user.user_id;
  validate(state.store.as_ref(), &body, owner).await?;

  let til = state
    .store
    .record_til(NewTil {
      uid:        owner,
      directory:  body.directory,
      content:    body.content,
      is_private: body.is_private,
    })
    .await
    .map_err(ApiError::store)?;
  tracing::debug!(til_id = %til.til_id, uid = %owner, "til recorded");
  Ok((StatusCode::CREATED, Json(til)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// Owners and admins see everything; others see public Tils only.
fn may_read(til: &Til, viewer: &Viewer) -> bool {
  if !til.is_private {
    return true;
  }
  viewer
    .identity()
    .is_some_and(|id| id.id == til.uid || id.is_admin())
}

/// `GET /til/{id}`
pub async fn get_one<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  viewer: Viewer,
  Path(id): Path<Uuid>,
) -> Result<Json<Til>, ApiError> {
  let not_found = || ApiError::NotFound(format!("til {id} not found"));
  let til = state
    .store
    .get_til(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(not_found)?;
  // Private Tils are indistinguishable from missing ones.
  if !may_read(&til, &viewer) {
    return Err(not_found());
  }
  Ok(Json(til))
}

// ─── Edit ────────────────────────────────────────────────────────────────────

/// `PUT /til/{id}`
pub async fn update_one<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
  Json(body): Json<TilBody>,
) -> Result<Json<Til>, ApiError> {
  let owner = caller.user.user_id;
  let not_found = || ApiError::NotFound(format!("til {id} not found"));
  let til = state
    .store
    .get_til(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(not_found)?;
  if til.uid != owner {
    return Err(ApiError::Forbidden("not your til".into()));
  }
  validate(state.store.as_ref(), &body, owner).await?;

  let til = state
    .store
    .update_til(id, TilEdit {
      directory:  body.directory,
      content:    body.content,
      is_private: body.is_private,
    })
    .await
    .map_err(ApiError::store)?
    .ok_or_else(not_found)?;
  tracing::debug!(til_id = %id, "til edited");
  Ok(Json(til))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /til/{id}`
pub async fn delete_one<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  let til = state
    .store
    .get_til(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("til {id} not found")))?;
  if til.uid != caller.user.user_id && !caller.identity.is_admin() {
    return Err(ApiError::Forbidden("not your til".into()));
  }
  state.store.delete_til(id).await.map_err(ApiError::store)?;
  tracing::debug!(til_id = %id, "til deleted");
  Ok(StatusCode::NO_CONTENT)
}
