//! Feed composition: which Tils a viewer sees, in what order, and how they
//! are enriched.
//!
//! Every feed kind runs through the same spine:
//!
//! 1. build a [`TilPredicate`] from the feed kind and the viewer,
//! 2. query the store (full-text for search, plain filter otherwise),
//! 3. populate the `uid` and `directory` references with their projections,
//! 4. sort newest first.
//!
//! The final sort is authoritative even though the store already returns
//! rows in the same order.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  projection::{PopulateConfig, Projected},
  store::{Page, TilPredicate, TilStore},
  til::Til,
  user::{AdminCapability, Identity},
};

// ─── Feed kinds ──────────────────────────────────────────────────────────────

/// The views the service exposes over the Til collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedKind {
  /// Own Tils plus public Tils of followed users. Requires an identity.
  Social,
  /// Every public Til.
  Anonymous,
  /// Every Til owned by the viewer, private ones included.
  Own,
  /// Every Til. Only reachable with an [`AdminCapability`].
  All(AdminCapability),
  /// Full-text search, restricted by the viewer's privacy rule.
  Search(String),
}

impl FeedKind {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Social => "social",
      Self::Anonymous => "anonymous",
      Self::Own => "own",
      Self::All(_) => "all",
      Self::Search(_) => "search",
    }
  }
}

/// A Til with its references replaced by restricted projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
  pub til_id:     Uuid,
  /// `None` if the owning user no longer exists.
  pub uid:        Option<Projected>,
  /// `None` if the Til is unfiled or its directory no longer exists.
  pub directory:  Option<Projected>,
  pub content:    String,
  pub is_private: bool,
  pub created:    DateTime<Utc>,
}

// ─── Page limits ─────────────────────────────────────────────────────────────

/// Bounds applied to caller-supplied page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedLimits {
  pub default_page_size: usize,
  pub max_page_size:     usize,
}

impl Default for FeedLimits {
  fn default() -> Self {
    Self { default_page_size: 50, max_page_size: 200 }
  }
}

impl FeedLimits {
  /// Clamp a requested window to `1..=max_page_size`.
  pub fn page(&self, limit: Option<usize>, offset: Option<usize>) -> Page {
    let max = self.max_page_size.max(1);
    Page {
      limit:  limit.unwrap_or(self.default_page_size).clamp(1, max),
      offset: offset.unwrap_or(0),
    }
  }
}

// ─── Predicates ──────────────────────────────────────────────────────────────

/// Own Tils regardless of privacy, or public Tils of followed users.
pub fn social_predicate(identity: &Identity) -> TilPredicate {
  TilPredicate::Or(vec![
    TilPredicate::And(vec![
      TilPredicate::OwnerIn(identity.following.clone()),
      TilPredicate::IsPrivate(false),
    ]),
    TilPredicate::OwnerIs(identity.id),
  ])
}

pub fn public_predicate() -> TilPredicate { TilPredicate::IsPrivate(false) }

/// The privacy rule for a viewer: the social rule when authenticated, the
/// public rule otherwise. Logging in therefore narrows search to the
/// viewer's own Tils and those of users they follow.
pub fn visibility_predicate(viewer: Option<&Identity>) -> TilPredicate {
  match viewer {
    Some(identity) => social_predicate(identity),
    None => public_predicate(),
  }
}

/// Build the store predicate for `kind`.
pub fn predicate_for(
  kind: &FeedKind,
  viewer: Option<&Identity>,
) -> Result<TilPredicate> {
  Ok(match kind {
    FeedKind::Social => social_predicate(viewer.ok_or(Error::AuthenticationRequired)?),
    FeedKind::Anonymous => public_predicate(),
    FeedKind::Own => {
      TilPredicate::OwnerIs(viewer.ok_or(Error::AuthenticationRequired)?.id)
    }
    FeedKind::All(_) => TilPredicate::Any,
    FeedKind::Search(_) => visibility_predicate(viewer),
  })
}

// ─── Ordering ────────────────────────────────────────────────────────────────

/// `created` descending, `til_id` ascending on ties.
pub fn sort_newest_first(entries: &mut [FeedEntry]) {
  entries.sort_by(|a, b| {
    b.created.cmp(&a.created).then_with(|| a.til_id.cmp(&b.til_id))
  });
}

// ─── Composer ────────────────────────────────────────────────────────────────

/// Builds feeds against a [`TilStore`].
pub struct FeedComposer<'a, S> {
  store:    &'a S,
  populate: &'a PopulateConfig,
}

impl<'a, S: TilStore> FeedComposer<'a, S> {
  pub fn new(store: &'a S, populate: &'a PopulateConfig) -> Self {
    Self { store, populate }
  }

  pub async fn social(
    &self,
    viewer: Option<&Identity>,
    page: Page,
  ) -> Result<Vec<FeedEntry>> {
    self.compose(&FeedKind::Social, viewer, page).await
  }

  pub async fn anonymous(&self, page: Page) -> Result<Vec<FeedEntry>> {
    self.compose(&FeedKind::Anonymous, None, page).await
  }

  pub async fn own(
    &self,
    viewer: Option<&Identity>,
    page: Page,
  ) -> Result<Vec<FeedEntry>> {
    self.compose(&FeedKind::Own, viewer, page).await
  }

  pub async fn all(
    &self,
    capability: AdminCapability,
    page: Page,
  ) -> Result<Vec<FeedEntry>> {
    self.compose(&FeedKind::All(capability), None, page).await
  }

  pub async fn search(
    &self,
    word: &str,
    viewer: Option<&Identity>,
    page: Page,
  ) -> Result<Vec<FeedEntry>> {
    self.compose(&FeedKind::Search(word.to_owned()), viewer, page).await
  }

  /// Run the full spine for `kind`.
  pub async fn compose(
    &self,
    kind: &FeedKind,
    viewer: Option<&Identity>,
    page: Page,
  ) -> Result<Vec<FeedEntry>> {
    let predicate = predicate_for(kind, viewer)?;
    tracing::debug!(feed = kind.name(), %predicate, ?page, "composing feed");

    let tils = match kind {
      FeedKind::Search(word) => {
        let term = word.trim();
        if term.is_empty() {
          return Err(Error::EmptySearchTerm);
        }
        self.store.search_tils(term, &predicate, page).await
      }
      _ => self.store.find_tils(&predicate, page).await,
    }
    .map_err(Error::data_access)?;

    let mut entries = self.enrich(tils).await?;
    sort_newest_first(&mut entries);
    tracing::debug!(feed = kind.name(), count = entries.len(), "feed composed");
    Ok(entries)
  }

  /// Replace references with projections. Broken references become `None`;
  /// no Til is dropped.
  async fn enrich(&self, tils: Vec<Til>) -> Result<Vec<FeedEntry>> {
    if tils.is_empty() {
      return Ok(Vec::new());
    }

    let user_ids: Vec<Uuid> = tils
      .iter()
      .map(|t| t.uid)
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect();
    let directory_ids: Vec<Uuid> = tils
      .iter()
      .filter_map(|t| t.directory)
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect();

    let users = self
      .store
      .populate_users(&user_ids, &self.populate.user)
      .await
      .map_err(Error::data_access)?;
    let directories = if directory_ids.is_empty() {
      HashMap::new()
    } else {
      self
        .store
        .populate_directories(&directory_ids, &self.populate.directory)
        .await
        .map_err(Error::data_access)?
    };

    Ok(
      tils
        .into_iter()
        .map(|til| {
          let uid = users.get(&til.uid).cloned();
          if uid.is_none() {
            tracing::debug!(til_id = %til.til_id, user_id = %til.uid, "owner reference is broken");
          }
          let directory = til.directory.and_then(|id| {
            let found = directories.get(&id).cloned();
            if found.is_none() {
              tracing::debug!(til_id = %til.til_id, directory_id = %id, "directory reference is broken");
            }
            found
          });
          FeedEntry {
            til_id: til.til_id,
            uid,
            directory,
            content: til.content,
            is_private: til.is_private,
            created: til.created,
          }
        })
        .collect(),
    )
  }
}
