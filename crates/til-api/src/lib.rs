//! JSON REST API for the TIL journal.
//!
//! Exposes an axum [`Router`] backed by any [`til_core::store::TilStore`].
//! Callers authenticate with HTTP Basic; requests without credentials are
//! anonymous. TLS and listening are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = til_api::api_router(AppState::new(store, populate, limits));
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod directories;
pub mod error;
pub mod etag;
pub mod feed;
pub mod tils;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use til_core::{feed::FeedLimits, projection::PopulateConfig, store::TilStore};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub populate: Arc<PopulateConfig>,
  pub limits:   FeedLimits,
}

impl<S> AppState<S> {
  pub fn new(store: Arc<S>, populate: PopulateConfig, limits: FeedLimits) -> Self {
    Self { store, populate: Arc::new(populate), limits }
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      populate: Arc::clone(&self.populate),
      limits:   self.limits,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: TilStore + 'static,
{
  Router::new()
    // Feeds
    .route("/feed", get(feed::social::<S>))
    .route("/feed/public", get(feed::anonymous::<S>))
    .route("/feed/me", get(feed::own::<S>))
    .route("/feed/all", get(feed::all::<S>))
    .route("/feed/search/{word}", get(feed::search::<S>))
    // Users
    .route("/users", get(users::list::<S>).post(users::register::<S>))
    .route(
      "/users/follow",
      post(users::follow::<S>).delete(users::unfollow::<S>),
    )
    .route("/users/{id}", get(users::get_one::<S>))
    .route(
      "/me",
      get(users::me).put(users::update_me::<S>).delete(users::delete_me::<S>),
    )
    // Directories
    .route("/directory", get(directories::list::<S>).post(directories::create::<S>))
    .route(
      "/directory/{id}",
      put(directories::rename_one::<S>).delete(directories::delete_one::<S>),
    )
    // Tils
    .route("/til", post(tils::create::<S>))
    .route(
      "/til/{id}",
      get(tils::get_one::<S>)
        .put(tils::update_one::<S>)
        .delete(tils::delete_one::<S>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use serde_json::{Value, json};
  use til_core::user::NewUser;
  use til_store_sqlite::SqliteStore;
  use tower::ServiceExt;
  use uuid::Uuid;

  use super::*;

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState::new(Arc::new(store), PopulateConfig::default(), FeedLimits::default())
  }

  fn basic(handle: &str) -> String {
    format!("Basic {}", B64.encode(format!("{handle}:pw-{handle}")))
  }

  async fn send(
    state: &AppState<SqliteStore>,
    method: &str,
    uri: &str,
    who: Option<&str>,
    body: Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(handle) = who {
      builder = builder.header(header::AUTHORIZATION, basic(handle));
    }
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    api_router(state.clone())
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn register(state: &AppState<SqliteStore>, handle: &str) -> Uuid {
    let resp = send(
      state,
      "POST",
      "/users",
      None,
      Some(json!({ "handle": handle, "password": format!("pw-{handle}") })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await["user_id"].as_str().unwrap().parse().unwrap()
  }

  async fn register_admin(state: &AppState<SqliteStore>, handle: &str) {
    state
      .store
      .add_user(NewUser {
        handle:        handle.into(),
        password_hash: auth::hash_password(&format!("pw-{handle}")).unwrap(),
        avatar:        None,
        bio:           None,
        is_admin:      true,
      })
      .await
      .unwrap()
      .unwrap();
  }

  async fn post_til(
    state: &AppState<SqliteStore>,
    who: &str,
    content: &str,
    private: bool,
  ) -> Uuid {
    let resp = send(
      state,
      "POST",
      "/til",
      Some(who),
      Some(json!({ "content": content, "is_private": private })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await["til_id"].as_str().unwrap().parse().unwrap()
  }

  fn contents(feed: &Value) -> Vec<&str> {
    feed
      .as_array()
      .unwrap()
      .iter()
      .map(|e| e["content"].as_str().unwrap())
      .collect()
  }

  // ── Registration & auth ─────────────────────────────────────────────────

  #[tokio::test]
  async fn duplicate_handle_is_409() {
    let state = make_state().await;
    register(&state, "ada").await;
    let resp = send(
      &state,
      "POST",
      "/users",
      None,
      Some(json!({ "handle": "ada", "password": "x" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn wrong_password_is_401_with_challenge() {
    let state = make_state().await;
    register(&state, "ada").await;
    let req = Request::builder()
      .uri("/me")
      .header(
        header::AUTHORIZATION,
        format!("Basic {}", B64.encode("ada:wrong")),
      )
      .body(Body::empty())
      .unwrap();
    let resp = api_router(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[tokio::test]
  async fn me_shows_following() {
    let state = make_state().await;
    register(&state, "ada").await;
    let bob = register(&state, "bob").await;
    let resp = send(&state, "POST", "/users/follow", Some("ada"), Some(json!({ "user_id": bob }))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let me = json_body(send(&state, "GET", "/me", Some("ada"), None).await).await;
    assert_eq!(me["following"], json!([bob]));

    let public = json_body(send(&state, "GET", &format!("/users/{bob}"), None, None).await).await;
    assert_eq!(public["handle"], "bob");
    assert!(public.get("following").is_none());
  }

  #[tokio::test]
  async fn follow_rejects_self_and_unknown() {
    let state = make_state().await;
    let ada = register(&state, "ada").await;
    let resp = send(&state, "POST", "/users/follow", Some("ada"), Some(json!({ "user_id": ada }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = send(
      &state,
      "POST",
      "/users/follow",
      Some("ada"),
      Some(json!({ "user_id": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── Feeds ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn social_feed_requires_authentication() {
    let state = make_state().await;
    let resp = send(&state, "GET", "/feed", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let resp = send(&state, "GET", "/feed/me", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn social_feed_shows_own_and_followed_public() {
    let state = make_state().await;
    register(&state, "ada").await;
    let bob = register(&state, "bob").await;
    register(&state, "eve").await;
    send(&state, "POST", "/users/follow", Some("ada"), Some(json!({ "user_id": bob }))).await;

    post_til(&state, "ada", "ada private", true).await;
    post_til(&state, "bob", "bob public", false).await;
    post_til(&state, "bob", "bob private", true).await;
    post_til(&state, "eve", "eve public", false).await;

    let resp = send(&state, "GET", "/feed", Some("ada"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key(header::ETAG));
    let feed = json_body(resp).await;
    assert_eq!(contents(&feed), ["bob public", "ada private"]);
    assert_eq!(feed[0]["uid"]["handle"], "bob");
    assert!(feed[0]["uid"].get("bio").is_none());

    let public = json_body(send(&state, "GET", "/feed/public", None, None).await).await;
    assert_eq!(contents(&public), ["eve public", "bob public"]);

    let own = json_body(send(&state, "GET", "/feed/me", Some("bob"), None).await).await;
    assert_eq!(contents(&own), ["bob private", "bob public"]);
  }

  #[tokio::test]
  async fn all_feed_is_admin_only() {
    let state = make_state().await;
    register(&state, "ada").await;
    register_admin(&state, "root").await;
    post_til(&state, "ada", "secret", true).await;

    let resp = send(&state, "GET", "/feed/all", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let resp = send(&state, "GET", "/feed/all", Some("ada"), None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = send(&state, "GET", "/feed/all", Some("root"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(contents(&json_body(resp).await), ["secret"]);
  }

  #[tokio::test]
  async fn search_respects_visibility() {
    let state = make_state().await;
    register(&state, "ada").await;
    post_til(&state, "ada", "borrowck is strict", false).await;
    post_til(&state, "ada", "borrowck diary", true).await;

    let anon = json_body(send(&state, "GET", "/feed/search/borrowck", None, None).await).await;
    assert_eq!(contents(&anon), ["borrowck is strict"]);
    let mine = json_body(send(&state, "GET", "/feed/search/borrowck", Some("ada"), None).await).await;
    assert_eq!(mine.as_array().unwrap().len(), 2);

    let blank = send(&state, "GET", "/feed/search/%20", None, None).await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn feed_pages_and_revalidates() {
    let state = make_state().await;
    register(&state, "ada").await;
    for i in 0..3 {
      post_til(&state, "ada", &format!("note {i}"), false).await;
    }

    let window = json_body(send(&state, "GET", "/feed/public?limit=1&offset=1", None, None).await).await;
    assert_eq!(contents(&window), ["note 1"]);

    let first = send(&state, "GET", "/feed/public", None, None).await;
    let etag = first.headers()[header::ETAG].to_str().unwrap().to_owned();
    let req = Request::builder()
      .uri("/feed/public")
      .header(header::IF_NONE_MATCH, etag)
      .body(Body::empty())
      .unwrap();
    let again = api_router(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(again.status(), StatusCode::NOT_MODIFIED);
  }

  // ── Directories & Tils ──────────────────────────────────────────────────

  #[tokio::test]
  async fn deleting_directory_keeps_til_with_null_directory() {
    let state = make_state().await;
    register(&state, "ada").await;
    let dir = json_body(
      send(&state, "POST", "/directory", Some("ada"), Some(json!({ "name": "rust" }))).await,
    )
    .await;
    let dir_id = dir["directory_id"].as_str().unwrap().to_owned();
    send(
      &state,
      "POST",
      "/til",
      Some("ada"),
      Some(json!({ "content": "filed", "directory": dir_id })),
    )
    .await;

    let feed = json_body(send(&state, "GET", "/feed/public", None, None).await).await;
    assert_eq!(feed[0]["directory"]["name"], "rust");

    let resp = send(&state, "DELETE", &format!("/directory/{dir_id}"), Some("ada"), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let feed = json_body(send(&state, "GET", "/feed/public", None, None).await).await;
    assert_eq!(contents(&feed), ["filed"]);
    assert!(feed[0]["directory"].is_null());
  }

  #[tokio::test]
  async fn foreign_directory_cannot_be_used_or_deleted() {
    let state = make_state().await;
    register(&state, "ada").await;
    register(&state, "eve").await;
    let dir = json_body(
      send(&state, "POST", "/directory", Some("ada"), Some(json!({ "name": "mine" }))).await,
    )
    .await;
    let dir_id = dir["directory_id"].as_str().unwrap().to_owned();

    let resp = send(
      &state,
      "POST",
      "/til",
      Some("eve"),
      Some(json!({ "content": "sneaky", "directory": dir_id })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = send(&state, "DELETE", &format!("/directory/{dir_id}"), Some("eve"), None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn private_til_is_hidden_from_others() {
    let state = make_state().await;
    register(&state, "ada").await;
    register(&state, "eve").await;
    let id = post_til(&state, "ada", "diary", true).await;
    let uri = format!("/til/{id}");

    assert_eq!(send(&state, "GET", &uri, None, None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(send(&state, "GET", &uri, Some("eve"), None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(send(&state, "GET", &uri, Some("ada"), None).await.status(), StatusCode::OK);

    assert_eq!(send(&state, "DELETE", &uri, Some("eve"), None).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(send(&state, "DELETE", &uri, Some("ada"), None).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(send(&state, "GET", &uri, Some("ada"), None).await.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn empty_til_content_is_rejected() {
    let state = make_state().await;
    register(&state, "ada").await;
    let resp = send(&state, "POST", "/til", Some("ada"), Some(json!({ "content": "  " }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  // ── Edits ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn edited_til_is_searchable_by_new_words_and_keeps_its_place() {
    let state = make_state().await;
    register(&state, "ada").await;
    register(&state, "eve").await;
    let older = post_til(&state, "ada", "lifetimes are confusing", false).await;
    post_til(&state, "ada", "traits are neat", false).await;
    let uri = format!("/til/{older}");
    let before = json_body(send(&state, "GET", &uri, None, None).await).await;

    let edit = json!({ "content": "lifetimes are variance in disguise" });
    let resp = send(&state, "PUT", &uri, Some("eve"), Some(edit.clone())).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = send(&state, "PUT", &uri, Some("ada"), Some(edit)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let after = json_body(resp).await;
    assert_eq!(after["created"], before["created"]);

    let hits = json_body(send(&state, "GET", "/feed/search/variance", None, None).await).await;
    assert_eq!(contents(&hits), ["lifetimes are variance in disguise"]);
    let stale = json_body(send(&state, "GET", "/feed/search/confusing", None, None).await).await;
    assert!(stale.as_array().unwrap().is_empty());

    let feed = json_body(send(&state, "GET", "/feed/public", None, None).await).await;
    assert_eq!(contents(&feed), ["traits are neat", "lifetimes are variance in disguise"]);
  }

  #[tokio::test]
  async fn til_edit_validates_body_and_target() {
    let state = make_state().await;
    register(&state, "ada").await;
    let id = post_til(&state, "ada", "draft", false).await;

    let resp = send(&state, "PUT", &format!("/til/{id}"), Some("ada"), Some(json!({ "content": " " }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = send(
      &state,
      "PUT",
      &format!("/til/{}", Uuid::new_v4()),
      Some("ada"),
      Some(json!({ "content": "ghost" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(
      &state,
      "PUT",
      &format!("/til/{id}"),
      Some("ada"),
      Some(json!({ "content": "draft", "is_private": true })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let public = json_body(send(&state, "GET", "/feed/public", None, None).await).await;
    assert!(public.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn directory_rename_is_owner_only_and_shows_in_feeds() {
    let state = make_state().await;
    register(&state, "ada").await;
    register(&state, "eve").await;
    let dir = json_body(
      send(&state, "POST", "/directory", Some("ada"), Some(json!({ "name": "rust" }))).await,
    )
    .await;
    let dir_id = dir["directory_id"].as_str().unwrap().to_owned();
    send(
      &state,
      "POST",
      "/til",
      Some("ada"),
      Some(json!({ "content": "filed", "directory": dir_id })),
    )
    .await;
    let uri = format!("/directory/{dir_id}");

    let resp = send(&state, "PUT", &uri, Some("eve"), Some(json!({ "name": "mine now" }))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = send(&state, "PUT", &uri, Some("ada"), Some(json!({ "name": "  " }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = send(&state, "PUT", &uri, Some("ada"), Some(json!({ "name": "rustlang" }))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["name"], "rustlang");

    let feed = json_body(send(&state, "GET", "/feed/public", None, None).await).await;
    assert_eq!(feed[0]["directory"]["name"], "rustlang");
  }

  #[tokio::test]
  async fn profile_can_be_edited_and_listed() {
    let state = make_state().await;
    register(&state, "ada").await;
    register(&state, "bob").await;

    let resp = send(
      &state,
      "PUT",
      "/me",
      Some("ada"),
      Some(json!({ "bio": "counts things", "avatar": "ada.png" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me = json_body(resp).await;
    assert_eq!(me["bio"], "counts things");
    assert_eq!(me["following"], json!([]));

    let users = json_body(send(&state, "GET", "/users", None, None).await).await;
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["handle"], "ada");
    assert_eq!(users[0]["avatar"], "ada.png");
    assert!(users.iter().all(|u| u.get("following").is_none()));
  }

  #[tokio::test]
  async fn deleted_account_can_no_longer_authenticate() {
    let state = make_state().await;
    register(&state, "ada").await;
    post_til(&state, "ada", "last words", false).await;

    let resp = send(&state, "DELETE", "/me", Some("ada"), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&state, "GET", "/me", Some("ada"), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let feed = json_body(send(&state, "GET", "/feed/public", None, None).await).await;
    assert_eq!(contents(&feed), ["last words"]);
    assert!(feed[0]["uid"].is_null());

    // The handle is free again.
    register(&state, "ada").await;
  }
}
