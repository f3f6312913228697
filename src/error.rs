//! Error types for the synchronization layer.
//!
//! Every fallible sync operation returns `SyncResult<T>`. Errors are `Clone`
//! because the last fetch error is kept on its cache entry next to the last
//! good value.

use thiserror::Error;

/// Result type alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Local validation failures for a job-start request. Never reach the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
  #[error("At least one subreddit with a name is required")]
  MissingSubreddits,

  #[error("Reddit client id and client secret are required")]
  MissingCredentials,

  #[error("Cluster range is empty: k_min {k_min} is greater than k_max {k_max}")]
  InvalidClusterRange { k_min: u32, k_max: u32 },
}

/// All errors surfaced by the cache, poller and mutation executor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
  #[error("Invalid job configuration: {0}")]
  Validation(#[from] ValidationError),

  /// Network unreachable, connection reset, or the caller's timeout elapsed
  #[error("Backend unreachable: {0}")]
  Transport(String),

  #[error("Backend returned {status}: {message}")]
  Backend { status: u16, message: String },

  #[error("Not found: {0}")]
  NotFound(String),
}

impl SyncError {
  pub fn transport(message: impl Into<String>) -> Self {
    Self::Transport(message.into())
  }

  pub fn backend(status: u16, message: impl Into<String>) -> Self {
    Self::Backend {
      status,
      message: message.into(),
    }
  }

  pub fn not_found(what: impl Into<String>) -> Self {
    Self::NotFound(what.into())
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound(_))
  }
}
