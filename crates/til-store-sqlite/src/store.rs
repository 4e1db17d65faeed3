//! The SQLite implementation of [`TilStore`].

use std::{collections::HashMap, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params_from_iter, types::Value};
use uuid::Uuid;

use til_core::{
  directory::{Directory, NewDirectory},
  projection::{Projected, Projection},
  store::{Page, TilPredicate, TilStore},
  til::{NewTil, Til, TilEdit},
  user::{Credentials, NewUser, ProfileEdit, User},
};

use crate::{
  Error, Result,
  encode::{
    RawDirectory, RawTil, RawUser, TIL_COLUMNS, decode_micros, decode_uuid,
    encode_dt, encode_uuid,
  },
  query::{match_expression, where_clause},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A TIL store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Outcome of a follow attempt, decided inside the connection closure.
enum FollowOutcome {
  Done,
  Missing(String),
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a Til query built from `tail` (everything after `SELECT … FROM`),
  /// appending the feed ordering and the page window.
  async fn query_tils(
    &self,
    tail: String,
    mut binds: Vec<Value>,
    page: Page,
  ) -> Result<Vec<Til>> {
    let sql = format!(
      "SELECT {TIL_COLUMNS} {tail}
       ORDER BY t.created_us DESC, t.til_id ASC
       LIMIT ? OFFSET ?"
    );
    binds.push(Value::Integer(i64::try_from(page.limit).unwrap_or(i64::MAX)));
    binds.push(Value::Integer(i64::try_from(page.offset).unwrap_or(i64::MAX)));

    let raws: Vec<RawTil> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(binds), RawTil::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTil::into_til).collect()
  }

  /// Load full user rows for `ids`; when `with_following` is false the
  /// follow table is not consulted and `following` is left empty.
  async fn load_users(&self, ids: &[Uuid], with_following: bool) -> Result<Vec<User>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let marks = vec!["?"; id_strs.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
          "SELECT user_id, handle, avatar, bio, is_admin, created_at
           FROM users WHERE user_id IN ({marks})"
        ))?;
        let mut users = stmt
          .query_map(params_from_iter(id_strs.iter()), |row| {
            Ok(RawUser {
              user_id:    row.get(0)?,
              handle:     row.get(1)?,
              avatar:     row.get(2)?,
              bio:        row.get(3)?,
              is_admin:   row.get(4)?,
              created_at: row.get(5)?,
              following:  Vec::new(),
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        if with_following {
          let mut stmt = conn.prepare(
            "SELECT followee_id FROM follows WHERE follower_id = ?1
             ORDER BY followee_id",
          )?;
          for user in &mut users {
            user.following = stmt
              .query_map(rusqlite::params![user.user_id], |r| r.get(0))?
              .collect::<rusqlite::Result<Vec<String>>>()?;
          }
        }
        Ok(users)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }
}

// ─── TilStore impl ───────────────────────────────────────────────────────────

impl TilStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<Option<User>> {
    let user = User {
      user_id:    Uuid::new_v4(),
      handle:     input.handle,
      avatar:     input.avatar,
      bio:        input.bio,
      is_admin:   input.is_admin,
      following:  Default::default(),
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(user.user_id);
    let handle = user.handle.clone();
    let avatar = user.avatar.clone();
    let bio    = user.bio.clone();
    let admin  = user.is_admin;
    let at_str = encode_dt(user.created_at);
    let hash   = input.password_hash;

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO users (user_id, handle, password_hash, avatar, bio, is_admin, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT(handle) DO NOTHING",
          rusqlite::params![id_str, handle, hash, avatar, bio, admin, at_str],
        )?)
      })
      .await?;

    if inserted == 0 {
      tracing::debug!(handle = %user.handle, "handle already taken");
      return Ok(None);
    }
    tracing::debug!(user_id = %user.user_id, handle = %user.handle, "user added");
    Ok(Some(user))
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    let ids: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT user_id FROM users ORDER BY created_at, user_id")?;
        let rows = stmt
          .query_map([], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    let ids = ids
      .iter()
      .map(|s| decode_uuid(s))
      .collect::<Result<Vec<_>>>()?;

    let mut users = self.load_users(&ids, false).await?;
    users.sort_by(|a, b| {
      a.created_at.cmp(&b.created_at).then_with(|| a.user_id.cmp(&b.user_id))
    });
    Ok(users)
  }

  async fn update_profile(&self, id: Uuid, edit: ProfileEdit) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE users SET avatar = ?2, bio = ?3 WHERE user_id = ?1",
          rusqlite::params![id_str, edit.avatar, edit.bio],
        )?)
      })
      .await?;

    if updated == 0 {
      return Ok(None);
    }
    self.get_user(id).await
  }

  async fn delete_user(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM follows WHERE follower_id = ?1 OR followee_id = ?1",
          rusqlite::params![id_str],
        )?;
        let removed = tx.execute(
          "DELETE FROM users WHERE user_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    if removed > 0 {
      tracing::debug!(user_id = %id, "user deleted");
    }
    Ok(removed > 0)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    Ok(self.load_users(&[id], true).await?.pop())
  }

  async fn get_credentials<'a>(&'a self, handle: &'a str) -> Result<Option<Credentials>> {
    let handle = handle.to_owned();

    let raw: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, password_hash FROM users WHERE handle = ?1",
              rusqlite::params![handle],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(id, password_hash)| -> Result<Credentials> {
        Ok(Credentials { user_id: Uuid::parse_str(&id)?, password_hash })
      })
      .transpose()
  }

  async fn follow(&self, follower: Uuid, followee: Uuid) -> Result<()> {
    if follower == followee {
      return Err(Error::SelfFollow);
    }
    let follower_str = encode_uuid(follower);
    let followee_str = encode_uuid(followee);
    let at_str       = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        for id in [&follower_str, &followee_str] {
          let exists = conn
            .query_row(
              "SELECT 1 FROM users WHERE user_id = ?1",
              rusqlite::params![id],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
          if !exists {
            return Ok(FollowOutcome::Missing(id.clone()));
          }
        }
        conn.execute(
          "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![follower_str, followee_str, at_str],
        )?;
        Ok(FollowOutcome::Done)
      })
      .await?;

    match outcome {
      FollowOutcome::Done => Ok(()),
      FollowOutcome::Missing(id) => Err(Error::UserNotFound(Uuid::parse_str(&id)?)),
    }
  }

  async fn unfollow(&self, follower: Uuid, followee: Uuid) -> Result<bool> {
    let follower_str = encode_uuid(follower);
    let followee_str = encode_uuid(followee);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
          rusqlite::params![follower_str, followee_str],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  // ── Directories ───────────────────────────────────────────────────────────

  async fn add_directory(&self, input: NewDirectory) -> Result<Directory> {
    let directory = Directory {
      directory_id: Uuid::new_v4(),
      uid:          input.uid,
      name:         input.name,
      created_at:   Utc::now(),
    };

    let id_str  = encode_uuid(directory.directory_id);
    let uid_str = encode_uuid(directory.uid);
    let name    = directory.name.clone();
    let at_str  = encode_dt(directory.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO directories (directory_id, uid, name, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, uid_str, name, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(directory)
  }

  async fn get_directory(&self, id: Uuid) -> Result<Option<Directory>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawDirectory> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT directory_id, uid, name, created_at
               FROM directories WHERE directory_id = ?1",
              rusqlite::params![id_str],
              RawDirectory::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDirectory::into_directory).transpose()
  }

  async fn list_directories(&self, owner: Uuid) -> Result<Vec<Directory>> {
    let owner_str = encode_uuid(owner);

    let raws: Vec<RawDirectory> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT directory_id, uid, name, created_at
           FROM directories WHERE uid = ?1
           ORDER BY created_at, directory_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str], RawDirectory::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDirectory::into_directory).collect()
  }

  async fn rename_directory(&self, id: Uuid, name: String) -> Result<Option<Directory>> {
    let id_str = encode_uuid(id);

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE directories SET name = ?2 WHERE directory_id = ?1",
          rusqlite::params![id_str, name],
        )?)
      })
      .await?;

    if updated == 0 {
      return Ok(None);
    }
    self.get_directory(id).await
  }

  async fn delete_directory(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM directories WHERE directory_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  // ── Tils ──────────────────────────────────────────────────────────────────

  async fn record_til(&self, input: NewTil) -> Result<Til> {
    let til_id = Uuid::new_v4();
    let now_us = Utc::now().timestamp_micros();

    let id_str      = encode_uuid(til_id);
    let uid_str     = encode_uuid(input.uid);
    let dir_str     = input.directory.map(encode_uuid);
    let content     = input.content.clone();
    let is_private  = input.is_private;

    let created_us: i64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let last: Option<i64> =
          tx.query_row("SELECT MAX(created_us) FROM tils", [], |r| r.get(0))?;
        // Strictly after every stored Til, even if the clock has not moved.
        let created_us = last.map_or(now_us, |last| now_us.max(last + 1));
        tx.execute(
          "INSERT INTO tils (til_id, uid, directory_id, content, is_private, created_us)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, uid_str, dir_str, content, is_private, created_us],
        )?;
        tx.execute(
          "INSERT INTO tils_fts (til_id, content) VALUES (?1, ?2)",
          rusqlite::params![id_str, content],
        )?;
        tx.commit()?;
        Ok(created_us)
      })
      .await?;

    Ok(Til {
      til_id,
      uid: input.uid,
      directory: input.directory,
      content: input.content,
      is_private: input.is_private,
      created: decode_micros(created_us)?,
    })
  }

  async fn get_til(&self, id: Uuid) -> Result<Option<Til>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawTil> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {TIL_COLUMNS} FROM tils t WHERE t.til_id = ?1"),
              rusqlite::params![id_str],
              RawTil::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTil::into_til).transpose()
  }

  async fn update_til(&self, id: Uuid, edit: TilEdit) -> Result<Option<Til>> {
    let id_str  = encode_uuid(id);
    let dir_str = edit.directory.map(encode_uuid);

    let raw: Option<RawTil> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE tils SET directory_id = ?2, content = ?3, is_private = ?4
           WHERE til_id = ?1",
          rusqlite::params![id_str, dir_str, edit.content, edit.is_private],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        tx.execute(
          "UPDATE tils_fts SET content = ?2 WHERE til_id = ?1",
          rusqlite::params![id_str, edit.content],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {TIL_COLUMNS} FROM tils t WHERE t.til_id = ?1"),
          rusqlite::params![id_str],
          RawTil::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.map(RawTil::into_til).transpose()
  }

  async fn delete_til(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let removed = tx.execute(
          "DELETE FROM tils WHERE til_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM tils_fts WHERE til_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    Ok(removed > 0)
  }

  // ── Feed queries ──────────────────────────────────────────────────────────

  async fn find_tils<'a>(
    &'a self,
    predicate: &'a TilPredicate,
    page: Page,
  ) -> Result<Vec<Til>> {
    let mut binds = Vec::new();
    let cond = where_clause(predicate, &mut binds);
    self
      .query_tils(format!("FROM tils t WHERE {cond}"), binds, page)
      .await
  }

  async fn search_tils<'a>(
    &'a self,
    term: &'a str,
    predicate: &'a TilPredicate,
    page: Page,
  ) -> Result<Vec<Til>> {
    let Some(expr) = match_expression(term) else {
      return Ok(Vec::new());
    };
    let mut binds = vec![Value::Text(expr)];
    let cond = where_clause(predicate, &mut binds);
    self
      .query_tils(
        format!(
          "FROM tils_fts
           JOIN tils t ON t.til_id = tils_fts.til_id
           WHERE tils_fts MATCH ? AND {cond}"
        ),
        binds,
        page,
      )
      .await
  }

  async fn populate_users<'a>(
    &'a self,
    ids: &'a [Uuid],
    projection: &'a Projection,
  ) -> Result<HashMap<Uuid, Projected>> {
    let with_following = projection.fields().iter().any(|f| f == "following");
    self
      .load_users(ids, with_following)
      .await?
      .into_iter()
      .map(|user| -> Result<(Uuid, Projected)> {
        let doc = serde_json::to_value(&user)?;
        Ok((user.user_id, projection.apply(user.user_id, &doc)))
      })
      .collect()
  }

  async fn populate_directories<'a>(
    &'a self,
    ids: &'a [Uuid],
    projection: &'a Projection,
  ) -> Result<HashMap<Uuid, Projected>> {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }
    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();

    let raws: Vec<RawDirectory> = self
      .conn
      .call(move |conn| {
        let marks = vec!["?"; id_strs.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
          "SELECT directory_id, uid, name, created_at
           FROM directories WHERE directory_id IN ({marks})"
        ))?;
        let rows = stmt
          .query_map(params_from_iter(id_strs.iter()), RawDirectory::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|raw| -> Result<(Uuid, Projected)> {
        let directory = raw.into_directory()?;
        let doc = serde_json::to_value(&directory)?;
        Ok((
          directory.directory_id,
          projection.apply(directory.directory_id, &doc),
        ))
      })
      .collect()
  }
}
