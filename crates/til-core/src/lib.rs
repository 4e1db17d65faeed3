//! Core types and the feed composer for the TIL journal service.
//!
//! This crate has no HTTP or database dependencies.
//! Storage backends implement [`store::TilStore`]; the HTTP layer calls
//! [`feed::FeedComposer`] and never builds feed predicates itself.

pub mod directory;
pub mod error;
pub mod feed;
pub mod projection;
pub mod store;
pub mod til;
pub mod user;

pub use error::{Error, Result};
