//! Encoding and decoding helpers between domain types and the plain
//! representations stored in SQLite columns.
//!
//! Record timestamps are stored as RFC 3339 strings. Til `created` values are
//! stored as integer microseconds so that ordering is numeric. UUIDs are
//! stored as hyphenated lowercase strings, whose text order equals
//! [`Uuid`]'s own order.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use til_core::{directory::Directory, til::Til, user::User};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_micros(us: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_micros(us)
    .ok_or_else(|| Error::DateParse(format!("timestamp out of range: {us}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a `users` row, plus the ids it follows.
pub struct RawUser {
  pub user_id:    String,
  pub handle:     String,
  pub avatar:     Option<String>,
  pub bio:        Option<String>,
  pub is_admin:   bool,
  pub created_at: String,
  pub following:  Vec<String>,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    let following = self
      .following
      .iter()
      .map(|s| decode_uuid(s))
      .collect::<Result<BTreeSet<_>>>()?;
    Ok(User {
      user_id: decode_uuid(&self.user_id)?,
      handle: self.handle,
      avatar: self.avatar,
      bio: self.bio,
      is_admin: self.is_admin,
      following,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from a `directories` row.
pub struct RawDirectory {
  pub directory_id: String,
  pub uid:          String,
  pub name:         String,
  pub created_at:   String,
}

impl RawDirectory {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      directory_id: row.get(0)?,
      uid:          row.get(1)?,
      name:         row.get(2)?,
      created_at:   row.get(3)?,
    })
  }

  pub fn into_directory(self) -> Result<Directory> {
    Ok(Directory {
      directory_id: decode_uuid(&self.directory_id)?,
      uid:          decode_uuid(&self.uid)?,
      name:         self.name,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from a `tils` row.
pub struct RawTil {
  pub til_id:       String,
  pub uid:          String,
  pub directory_id: Option<String>,
  pub content:      String,
  pub is_private:   bool,
  pub created_us:   i64,
}

impl RawTil {
  /// Column order: `til_id, uid, directory_id, content, is_private,
  /// created_us`.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      til_id:       row.get(0)?,
      uid:          row.get(1)?,
      directory_id: row.get(2)?,
      content:      row.get(3)?,
      is_private:   row.get(4)?,
      created_us:   row.get(5)?,
    })
  }

  pub fn into_til(self) -> Result<Til> {
    Ok(Til {
      til_id:     decode_uuid(&self.til_id)?,
      uid:        decode_uuid(&self.uid)?,
      directory:  self.directory_id.as_deref().map(decode_uuid).transpose()?,
      content:    self.content,
      is_private: self.is_private,
      created:    decode_micros(self.created_us)?,
    })
  }
}

pub const TIL_COLUMNS: &str =
  "t.til_id, t.uid, t.directory_id, t.content, t.is_private, t.created_us";
