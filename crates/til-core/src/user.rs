//! Users, the follow graph, and the request identity derived from them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account. Credentials are held by the store and are never
/// part of this value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub handle:     String,
  pub avatar:     Option<String>,
  pub bio:        Option<String>,
  pub is_admin:   bool,
  /// Users this user follows. Directed; never contains `user_id`.
  pub following:  BTreeSet<Uuid>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::TilStore::add_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub handle:        String,
  /// argon2 PHC string, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub avatar:        Option<String>,
  pub bio:           Option<String>,
  pub is_admin:      bool,
}

/// Replacement for the self-editable profile fields.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
  pub avatar: Option<String>,
  pub bio:    Option<String>,
}

/// What the store hands back to the authorization gate for a handle.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub user_id:       Uuid,
  pub password_hash: String,
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// An authenticated viewer: who they are and whom they follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
  pub id:        Uuid,
  pub following: BTreeSet<Uuid>,
  is_admin:      bool,
}

impl Identity {
  /// A non-administrative identity.
  pub fn new(id: Uuid, following: impl IntoIterator<Item = Uuid>) -> Self {
    Self {
      id,
      following: following.into_iter().collect(),
      is_admin: false,
    }
  }

  pub fn is_admin(&self) -> bool { self.is_admin }

  /// Mint the capability required by the administrative feed. `None` unless
  /// the identity belongs to an admin user.
  pub fn admin_capability(&self) -> Option<AdminCapability> {
    self.is_admin.then_some(AdminCapability { _private: () })
  }
}

impl From<&User> for Identity {
  fn from(user: &User) -> Self {
    Self {
      id:        user.user_id,
      following: user.following.clone(),
      is_admin:  user.is_admin,
    }
  }
}

/// Proof that the caller passed the administrative check. Only obtainable
/// through [`Identity::admin_capability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminCapability {
  _private: (),
}
