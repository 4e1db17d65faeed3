//! SQLite backend for the TIL store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Til bodies are indexed with FTS5 for
//! [`til_core::store::TilStore::search_tils`].

mod encode;
mod query;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
