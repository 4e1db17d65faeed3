//! Handlers for user accounts and the follow graph.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/users` | Register. Body: `{"handle","password","avatar"?,"bio"?}`; 409 on a taken handle |
//! | `GET`    | `/users` | Every public profile |
//! | `GET`    | `/users/{id}` | Public profile; 404 if not found |
//! | `GET`    | `/me` | The caller's own profile |
//! | `PUT`    | `/me` | Body: `{"avatar"?,"bio"?}`; replaces both |
//! | `DELETE` | `/me` | Deletes the account; 204 |
//! | `POST`   | `/users/follow` | Body: `{"user_id"}`; 204 |
//! | `DELETE` | `/users/follow` | Body: `{"user_id"}`; 204 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use til_core::{
  store::TilStore,
  user::{NewUser, ProfileEdit, User},
};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Authenticated, hash_password},
  error::ApiError,
};

/// The public face of a [`User`]. The follow graph is only shown to its
/// owner.
#[derive(Debug, Serialize, Deserialize)]
pub struct Profile {
  pub user_id:    Uuid,
  pub handle:     String,
  pub avatar:     Option<String>,
  pub bio:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub following:  Option<Vec<Uuid>>,
}

impl Profile {
  fn public(user: User) -> Self {
    Self {
      user_id:   user.user_id,
      handle:    user.handle,
      avatar:    user.avatar,
      bio:       user.bio,
      following: None,
    }
  }

  fn private(user: User) -> Self {
    let following = user.following.iter().copied().collect();
    Self { following: Some(following), ..Self::public(user) }
  }
}

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub handle:   String,
  pub password: String,
  pub avatar:   Option<String>,
  pub bio:      Option<String>,
}

fn valid_handle(handle: &str) -> bool {
  !handle.is_empty()
    && handle.len() <= 32
    && handle
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// `POST /users`
pub async fn register<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError> {
  if !valid_handle(&body.handle) {
    return Err(ApiError::BadRequest(
      "handle must be 1-32 characters of [A-Za-z0-9_-]".into(),
    ));
  }
  if body.password.is_empty() {
    return Err(ApiError::BadRequest("password must not be empty".into()));
  }

  let taken = || ApiError::Conflict(format!("handle {} is taken", body.handle));
  let user = state
    .store
    .add_user(NewUser {
      handle:        body.handle.clone(),
      password_hash: hash_password(&body.password)?,
      avatar:        body.avatar.clone(),
      bio:           body.bio.clone(),
      is_admin:      false,
    })
    .await
    .map_err(ApiError::store)?
    .ok_or_else(taken)?;
  tracing::info!(user_id = %user.user_id, handle = %user.handle, "user registered");
  Ok((StatusCode::CREATED, Json(Profile::private(user))))
}

// ─── Profiles ────────────────────────────────────────────────────────────────

/// `GET /users`
pub async fn list<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Profile>>, ApiError> {
  let users = state.store.list_users().await.map_err(ApiError::store)?;
  Ok(Json(users.into_iter().map(Profile::public).collect()))
}

/// `GET /users/{id}`
pub async fn get_one<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Profile>, ApiError> {
  let user = state
    .store
    .get_user(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
  Ok(Json(Profile::public(user)))
}

/// `GET /me`
pub async fn me(Authenticated(caller): Authenticated) -> Json<Profile> {
  Json(Profile::private(caller.user))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileBody {
  pub avatar: Option<String>,
  pub bio:    Option<String>,
}

/// `PUT /me`
pub async fn update_me<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Json(body): Json<ProfileBody>,
) -> Result<Json<Profile>, ApiError> {
  let id = caller.user.user_id;
  let user = state
    .store
    .update_profile(id, ProfileEdit { avatar: body.avatar, bio: body.bio })
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
  Ok(Json(Profile::private(user)))
}

/// `DELETE /me`
pub async fn delete_me<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<StatusCode, ApiError> {
  state
    .store
    .delete_user(caller.user.user_id)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(user_id = %caller.user.user_id, "account deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Follow graph ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FollowBody {
  pub user_id: Uuid,
}

/// `POST /users/follow`
pub async fn follow<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Json(body): Json<FollowBody>,
) -> Result<StatusCode, ApiError> {
  let me = caller.user.user_id;
  if body.user_id == me {
    return Err(ApiError::BadRequest("cannot follow yourself".into()));
  }
  state
    .store
    .get_user(body.user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {} not found", body.user_id)))?;

  state
    .store
    .follow(me, body.user_id)
    .await
    .map_err(ApiError::store)?;
  tracing::debug!(follower = %me, followee = %body.user_id, "followed");
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /users/follow`
pub async fn unfollow<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Json(body): Json<FollowBody>,
) -> Result<StatusCode, ApiError> {
  state
    .store
    .unfollow(caller.user.user_id, body.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
