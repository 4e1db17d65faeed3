//! Tils: the atomic journal entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored note. Read-only to the feed composer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Til {
  pub til_id:     Uuid,
  /// Owning user.
  pub uid:        Uuid,
  /// Unfiled when `None`. May point at a directory that no longer exists.
  pub directory:  Option<Uuid>,
  pub content:    String,
  pub is_private: bool,
  /// Store-assigned; the sole sort key of every feed.
  pub created:    DateTime<Utc>,
}

/// Input to [`crate::store::TilStore::record_til`].
/// `created` is always set by the store; it is not accepted from callers.
#[derive(Debug, Clone)]
pub struct NewTil {
  pub uid:        Uuid,
  pub directory:  Option<Uuid>,
  pub content:    String,
  pub is_private: bool,
}

/// Replacement for the editable fields of a Til, applied by
/// [`crate::store::TilStore::update_til`]. Owner and `created` never change.
#[derive(Debug, Clone)]
pub struct TilEdit {
  pub directory:  Option<Uuid>,
  pub content:    String,
  pub is_private: bool,
}
