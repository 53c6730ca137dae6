//! Refresh Source Port
//!
//! Defines where new database generations come from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Errors raised while refreshing the database.
///
/// None of these ever reach a lookup caller; the active generation keeps
/// serving.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("freshness check failed: {0}")]
    Check(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("failed to open {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Provider of new database generations.
///
/// Implementations may poll an HTTP endpoint, a local file, or anything
/// else able to stamp a version with a modification time.
#[async_trait]
pub trait RefreshSource: Send + Sync {
    /// Modification stamp of the newest generation the source can provide.
    async fn latest_modified(&self) -> Result<DateTime<Utc>, RefreshError>;

    /// Produce the newest generation as a complete file at `dest`.
    ///
    /// `dest` must not be observable in a partially written state.
    async fn fetch(&self, dest: &Path) -> Result<(), RefreshError>;
}
