//! Entity tags for feed responses.
//!
//! A feed ETag is the SHA-256 of the serialized entries. Order is part of
//! the feed, so unlike a set digest the entries are hashed as returned.

use axum::{
  Json,
  http::{HeaderMap, HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use til_core::feed::FeedEntry;

use crate::error::ApiError;

/// Compute a quoted strong ETag for `entries`.
pub fn compute_etag(entries: &[FeedEntry]) -> Result<String, ApiError> {
  let body = serde_json::to_vec(entries).map_err(ApiError::store)?;
  let hash = Sha256::digest(&body);
  Ok(format!("\"{}\"", hex::encode(hash)))
}

/// True when `If-None-Match` lists `etag` or `*`.
fn not_modified(headers: &HeaderMap, etag: &str) -> bool {
  headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| v.split(',').map(str::trim).any(|t| t == etag || t == "*"))
}

/// Respond with the feed and its ETag, or `304 Not Modified` if the client
/// already holds it.
pub fn feed_response(
  request: &HeaderMap,
  entries: Vec<FeedEntry>,
) -> Result<Response, ApiError> {
  let etag = compute_etag(&entries)?;
  let value = HeaderValue::from_str(&etag).map_err(ApiError::store)?;

  let mut res = if not_modified(request, &etag) {
    StatusCode::NOT_MODIFIED.into_response()
  } else {
    Json(entries).into_response()
  };
  res.headers_mut().insert(header::ETAG, value);
  Ok(res)
}
