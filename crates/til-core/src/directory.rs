//! Directories: named groupings of Tils owned by one user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
  pub directory_id: Uuid,
  /// Owning user.
  pub uid:          Uuid,
  pub name:         String,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::TilStore::add_directory`].
#[derive(Debug, Clone)]
pub struct NewDirectory {
  pub uid:  Uuid,
  pub name: String,
}
