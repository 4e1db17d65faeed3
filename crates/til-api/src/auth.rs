//! The authorization gate: HTTP Basic credentials checked against the
//! argon2 hashes held by the store.
//!
//! A request without an `Authorization` header is anonymous. A request with
//! a malformed header or wrong credentials is rejected, never downgraded to
//! anonymous.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use rand_core::OsRng;
use til_core::{
  store::TilStore,
  user::{Identity, User},
};

use crate::{AppState, error::ApiError};

/// An authenticated caller: the stored user and the identity the feed
/// composer consumes.
#[derive(Debug, Clone)]
pub struct Caller {
  pub user:     User,
  pub identity: Identity,
}

/// Produce an argon2 PHC string for `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::BadRequest(format!("cannot hash password: {e}")))
}

fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
    .is_ok()
}

/// Split a `Basic` authorization header into handle and password.
/// `Ok(None)` when the header is absent.
fn basic_credentials(headers: &HeaderMap) -> Result<Option<(String, String)>, ApiError> {
  let Some(value) = headers.get(header::AUTHORIZATION) else {
    return Ok(None);
  };
  let value = value.to_str().map_err(|_| ApiError::Unauthorized)?;
  let encoded = value.strip_prefix("Basic ").ok_or(ApiError::Unauthorized)?;
  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;
  let (handle, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok(Some((handle.to_owned(), password.to_owned())))
}

/// Resolve a request to an authenticated caller, or `None` for anonymous.
pub async fn resolve_caller<S: TilStore>(
  headers: &HeaderMap,
  store: &S,
) -> Result<Option<Caller>, ApiError> {
  let Some((handle, password)) = basic_credentials(headers)? else {
    return Ok(None);
  };

  let creds = store
    .get_credentials(&handle)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      tracing::debug!(%handle, "unknown handle");
      ApiError::Unauthorized
    })?;

  if !verify_password(&password, &creds.password_hash) {
    tracing::debug!(%handle, "password mismatch");
    return Err(ApiError::Unauthorized);
  }

  let user = store
    .get_user(creds.user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::Unauthorized)?;
  let identity = Identity::from(&user);
  Ok(Some(Caller { user, identity }))
}

/// Resolve a request to an [`Identity`], or `None` for anonymous.
pub async fn resolve_identity<S: TilStore>(
  headers: &HeaderMap,
  store: &S,
) -> Result<Option<Identity>, ApiError> {
  Ok(resolve_caller(headers, store).await?.map(|c| c.identity))
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// The caller, if any. Bad credentials still reject the request.
pub struct Viewer(pub Option<Caller>);

impl Viewer {
  pub fn identity(&self) -> Option<&Identity> {
    self.0.as_ref().map(|c| &c.identity)
  }
}

/// A caller that must be authenticated.
pub struct Authenticated(pub Caller);

impl<S> FromRequestParts<AppState<S>> for Viewer
where
  S: TilStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    Ok(Viewer(resolve_caller(&parts.headers, state.store.as_ref()).await?))
  }
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: TilStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    resolve_caller(&parts.headers, state.store.as_ref())
      .await?
      .map(Authenticated)
      .ok_or(ApiError::Unauthorized)
  }
}
