//! Error types for `til-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// An identity-bound feed was requested anonymously.
  #[error("authentication required")]
  AuthenticationRequired,

  #[error("search term must not be empty")]
  EmptySearchTerm,

  /// The store failed to execute a query. Carries the backend's error.
  #[error("data access error: {0}")]
  DataAccess(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn data_access<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::DataAccess(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
