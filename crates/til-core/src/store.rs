//! The `TilStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `til-store-sqlite`).
//! The feed composer and the HTTP layer depend on this abstraction, not on
//! any concrete backend.

use std::{
  collections::{BTreeSet, HashMap},
  fmt,
  future::Future,
};

use uuid::Uuid;

use crate::{
  directory::{Directory, NewDirectory},
  projection::{Projected, Projection},
  til::{NewTil, Til, TilEdit},
  user::{Credentials, NewUser, ProfileEdit, User},
};

// ─── Predicate ───────────────────────────────────────────────────────────────

/// A filter over Tils. Backends translate it into their own query language;
/// [`TilPredicate::matches`] is the reference semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TilPredicate {
  /// Matches every Til.
  Any,
  IsPrivate(bool),
  OwnerIs(Uuid),
  /// Owner is one of the set. An empty set matches nothing.
  OwnerIn(BTreeSet<Uuid>),
  /// All must match. Empty matches everything.
  And(Vec<TilPredicate>),
  /// At least one must match. Empty matches nothing.
  Or(Vec<TilPredicate>),
}

impl TilPredicate {
  pub fn matches(&self, til: &Til) -> bool {
    match self {
      Self::Any => true,
      Self::IsPrivate(flag) => til.is_private == *flag,
      Self::OwnerIs(id) => til.uid == *id,
      Self::OwnerIn(ids) => ids.contains(&til.uid),
      Self::And(parts) => parts.iter().all(|p| p.matches(til)),
      Self::Or(parts) => parts.iter().any(|p| p.matches(til)),
    }
  }
}

impl fmt::Display for TilPredicate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Any => write!(f, "any"),
      Self::IsPrivate(flag) => write!(f, "is_private = {flag}"),
      Self::OwnerIs(id) => write!(f, "uid = {id}"),
      Self::OwnerIn(ids) => write!(f, "uid in [{} ids]", ids.len()),
      Self::And(parts) => write_joined(f, "and", parts),
      Self::Or(parts) => write_joined(f, "or", parts),
    }
  }
}

fn write_joined(
  f: &mut fmt::Formatter<'_>,
  op: &str,
  parts: &[TilPredicate],
) -> fmt::Result {
  write!(f, "(")?;
  for (i, part) in parts.iter().enumerate() {
    if i > 0 {
      write!(f, " {op} ")?;
    }
    write!(f, "{part}")?;
  }
  write!(f, ")")
}

// ─── Pagination ──────────────────────────────────────────────────────────────

/// A bounded window over an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
  pub limit:  usize,
  pub offset: usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a document store holding users, directories, and Tils.
///
/// Every Til query returns rows ordered newest first (`created` descending,
/// `til_id` ascending on ties) before `page` is applied.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait TilStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a new user. `None` if the handle is already taken; the check
  /// and the insert are atomic.
  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Retrieve a user, with their following set, by UUID.
  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// All users, oldest first. `following` is left empty.
  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Replace a user's avatar and bio. `None` if the user does not exist.
  fn update_profile(
    &self,
    id: Uuid,
    edit: ProfileEdit,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Delete a user and every follow edge touching them. Their Tils and
  /// directories keep a dangling owner reference.
  fn delete_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Look up the stored credentials for a handle.
  fn get_credentials<'a>(
    &'a self,
    handle: &'a str,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + 'a;

  /// Record that `follower` follows `followee`. Idempotent. Fails if either
  /// user is unknown or if they are the same user.
  fn follow(
    &self,
    follower: Uuid,
    followee: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Returns `false` if there was nothing to remove.
  fn unfollow(
    &self,
    follower: Uuid,
    followee: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Directories ───────────────────────────────────────────────────────

  fn add_directory(
    &self,
    input: NewDirectory,
  ) -> impl Future<Output = Result<Directory, Self::Error>> + Send + '_;

  fn get_directory(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Directory>, Self::Error>> + Send + '_;

  /// All directories owned by `owner`, oldest first.
  fn list_directories(
    &self,
    owner: Uuid,
  ) -> impl Future<Output = Result<Vec<Directory>, Self::Error>> + Send + '_;

  /// Rename a directory. `None` if it does not exist.
  fn rename_directory(
    &self,
    id: Uuid,
    name: String,
  ) -> impl Future<Output = Result<Option<Directory>, Self::Error>> + Send + '_;

  /// Delete a directory. Tils filed under it keep their reference.
  fn delete_directory(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Tils ──────────────────────────────────────────────────────────────

  /// Persist a new Til. `created` is assigned by the store and never
  /// precedes the `created` of any Til already stored.
  fn record_til(
    &self,
    input: NewTil,
  ) -> impl Future<Output = Result<Til, Self::Error>> + Send + '_;

  fn get_til(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Til>, Self::Error>> + Send + '_;

  /// Replace the editable fields of a Til, keeping its owner and `created`
  /// and re-indexing its content. `None` if the Til does not exist.
  fn update_til(
    &self,
    id: Uuid,
    edit: TilEdit,
  ) -> impl Future<Output = Result<Option<Til>, Self::Error>> + Send + '_;

  fn delete_til(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Feed queries ──────────────────────────────────────────────────────

  /// Tils matching `predicate`, newest first, windowed by `page`.
  fn find_tils<'a>(
    &'a self,
    predicate: &'a TilPredicate,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Til>, Self::Error>> + Send + 'a;

  /// Tils whose content matches `term` under the store's full-text rules
  /// and that also satisfy `predicate`, newest first.
  fn search_tils<'a>(
    &'a self,
    term: &'a str,
    predicate: &'a TilPredicate,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Til>, Self::Error>> + Send + 'a;

  /// Resolve user references to `projection`. Unknown ids are absent from
  /// the returned map.
  fn populate_users<'a>(
    &'a self,
    ids: &'a [Uuid],
    projection: &'a Projection,
  ) -> impl Future<Output = Result<HashMap<Uuid, Projected>, Self::Error>> + Send + 'a;

  /// Resolve directory references to `projection`. Unknown ids are absent
  /// from the returned map.
  fn populate_directories<'a>(
    &'a self,
    ids: &'a [Uuid],
    projection: &'a Projection,
  ) -> impl Future<Output = Result<HashMap<Uuid, Projected>, Self::Error>> + Send + 'a;
}
