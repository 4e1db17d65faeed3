//! SQL schema for the TIL SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    handle        TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,     -- argon2 PHC string
    avatar        TEXT,
    bio           TEXT,
    is_admin      INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL      -- RFC 3339 UTC
);

CREATE TABLE IF NOT EXISTS follows (
    follower_id TEXT NOT NULL REFERENCES users(user_id),
    followee_id TEXT NOT NULL REFERENCES users(user_id),
    created_at  TEXT NOT NULL,
    PRIMARY KEY (follower_id, followee_id),
    CHECK (follower_id != followee_id)
);

-- Directory and Til references are plain ids without FOREIGN KEY
-- constraints. A deleted referent leaves a dangling id behind, which
-- population resolves to null.
CREATE TABLE IF NOT EXISTS directories (
    directory_id TEXT PRIMARY KEY,
    uid          TEXT NOT NULL,
    name         TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tils (
    til_id       TEXT PRIMARY KEY,
    uid          TEXT NOT NULL,
    directory_id TEXT,
    content      TEXT NOT NULL,
    is_private   INTEGER NOT NULL DEFAULT 0,
    created_us   INTEGER NOT NULL    -- microseconds since the Unix epoch
);

-- Standalone full-text index over til bodies, maintained alongside `tils`.
CREATE VIRTUAL TABLE IF NOT EXISTS tils_fts USING fts5(
    til_id UNINDEXED,
    content
);

CREATE INDEX IF NOT EXISTS tils_created_idx     ON tils(created_us DESC, til_id);
CREATE INDEX IF NOT EXISTS tils_uid_idx         ON tils(uid);
CREATE INDEX IF NOT EXISTS directories_uid_idx  ON directories(uid);
CREATE INDEX IF NOT EXISTS follows_followee_idx ON follows(followee_id);

PRAGMA user_version = 1;
";
