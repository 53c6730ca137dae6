//! Local File Refresh Source
//!
//! Implements RefreshSource over a file that an external updater (cron job,
//! geoipupdate, a mounted volume) rewrites in place.

use crate::domain::ports::{RefreshError, RefreshSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Temporary sibling of `dest` used while a generation is being written.
pub(crate) fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Refresh source that copies a local file when its mtime advances.
pub struct FileRefreshSource {
    path: PathBuf,
}

impl FileRefreshSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RefreshSource for FileRefreshSource {
    async fn latest_modified(&self) -> Result<DateTime<Utc>, RefreshError> {
        let mtime = tokio::fs::metadata(&self.path)
            .await
            .and_then(|meta| meta.modified())
            .map_err(|e| RefreshError::Check(format!("{}: {}", self.path.display(), e)))?;
        Ok(DateTime::<Utc>::from(mtime))
    }

    async fn fetch(&self, dest: &Path) -> Result<(), RefreshError> {
        let part = part_path(dest);
        if let Err(e) = tokio::fs::copy(&self.path, &part).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(RefreshError::Fetch(format!(
                "copy {} -> {}: {}",
                self.path.display(),
                part.display(),
                e
            )));
        }
        tokio::fs::rename(&part, dest).await?;
        tracing::debug!("copied {} to {}", self.path.display(), dest.display());
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_part_path_appends_suffix() {
        let part = part_path(Path::new("/data/GeoLite2-City-3.mmdb"));
        assert_eq!(part, PathBuf::from("/data/GeoLite2-City-3.mmdb.part"));
    }

    #[tokio::test]
    async fn test_latest_modified_reads_mtime() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("upstream.mmdb");
        std::fs::write(&src, b"v1").unwrap();

        let source = FileRefreshSource::new(&src);
        let modified = source.latest_modified().await.unwrap();

        let expected = DateTime::<Utc>::from(std::fs::metadata(&src).unwrap().modified().unwrap());
        assert_eq!(modified, expected);
    }

    #[tokio::test]
    async fn test_latest_modified_missing_file() {
        let source = FileRefreshSource::new("/nonexistent/upstream.mmdb");
        let result = source.latest_modified().await;
        assert!(matches!(result, Err(RefreshError::Check(_))));
    }

    #[tokio::test]
    async fn test_fetch_copies_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("upstream.mmdb");
        let dest = dir.path().join("GeoLite2-City-1.mmdb");
        std::fs::write(&src, b"database bytes").unwrap();

        FileRefreshSource::new(&src).fetch(&dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"database bytes");
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_fetch_missing_file_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("GeoLite2-City-1.mmdb");

        let result = FileRefreshSource::new(dir.path().join("missing.mmdb"))
            .fetch(&dest)
            .await;

        assert!(matches!(result, Err(RefreshError::Fetch(_))));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }
}
