//! Handlers for `/feed` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/feed` | Social feed; 401 when anonymous |
//! | `GET`  | `/feed/public` | Public Tils of everyone |
//! | `GET`  | `/feed/me` | The caller's own Tils; 401 when anonymous |
//! | `GET`  | `/feed/all` | Every Til; 401 when anonymous, 403 for non-admins |
//! | `GET`  | `/feed/search/{word}` | Full-text search within the caller's visibility |
//!
//! Every endpoint takes `?limit=&offset=` and answers with an `ETag`.

use axum::{
  extract::{Path, Query, State},
  http::HeaderMap,
  response::Response,
};
use serde::Deserialize;
use til_core::{feed::FeedComposer, store::{Page, TilStore}};

use crate::{
  AppState,
  auth::Viewer,
  error::ApiError,
  etag::feed_response,
};

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

impl<S: TilStore> AppState<S> {
  fn page(&self, params: &PageParams) -> Page {
    self.limits.page(params.limit, params.offset)
  }

  fn composer(&self) -> FeedComposer<'_, S> {
    FeedComposer::new(self.store.as_ref(), self.populate.as_ref())
  }
}

/// `GET /feed`
pub async fn social<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  viewer: Viewer,
  headers: HeaderMap,
  Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
  let entries = state
    .composer()
    .social(viewer.identity(), state.page(&params))
    .await?;
  feed_response(&headers, entries)
}

/// `GET /feed/public`
pub async fn anonymous<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
  let entries = state.composer().anonymous(state.page(&params)).await?;
  feed_response(&headers, entries)
}

/// `GET /feed/me`
pub async fn own<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  viewer: Viewer,
  headers: HeaderMap,
  Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
  let entries = state
    .composer()
    .own(viewer.identity(), state.page(&params))
    .await?;
  feed_response(&headers, entries)
}

/// `GET /feed/all`
pub async fn all<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  viewer: Viewer,
  headers: HeaderMap,
  Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
  let identity = viewer.identity().ok_or(ApiError::Unauthorized)?;
  let capability = identity
    .admin_capability()
    .ok_or_else(|| ApiError::Forbidden("administrators only".into()))?;
  let entries = state.composer().all(capability, state.page(&params)).await?;
  feed_response(&headers, entries)
}

/// `GET /feed/search/{word}`
pub async fn search<S: TilStore + 'static>(
  State(state): State<AppState<S>>,
  viewer: Viewer,
  headers: HeaderMap,
  Path(word): Path<String>,
  Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
  let entries = state
    .composer()
    .search(&word, viewer.identity(), state.page(&params))
    .await?;
  feed_response(&headers, entries)
}
