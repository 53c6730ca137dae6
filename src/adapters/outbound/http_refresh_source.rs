//! HTTP Refresh Source
//!
//! Implements RefreshSource against a download URL. The freshness check is
//! a HEAD request reading `Last-Modified`; the fetch is a GET whose body is
//! streamed to disk and gunzipped when it carries the gzip magic bytes.

use super::file_refresh_source::part_path;
use crate::domain::ports::{RefreshError, RefreshSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use reqwest::header::LAST_MODIFIED;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Refresh source downloading the database over HTTP(S).
pub struct HttpRefreshSource {
    client: reqwest::Client,
    url: String,
}

impl HttpRefreshSource {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Stream the response body, as sent, into `raw`.
    async fn download(&self, raw: &Path) -> Result<u64, RefreshError> {
        let mut resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RefreshError::Fetch(e.to_string()))?;

        let mut file = tokio::fs::File::create(raw).await?;
        let mut written = 0u64;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| RefreshError::Fetch(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

/// Sibling of `dest` holding the body exactly as downloaded.
fn raw_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".download");
    PathBuf::from(name)
}

/// Parse an HTTP date (`Tue, 15 Nov 1994 08:12:31 GMT`).
fn parse_http_date(value: &str) -> Result<DateTime<Utc>, RefreshError> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RefreshError::Check(format!("invalid Last-Modified {:?}: {}", value, e)))
}

/// Copy `raw` to `out`, gunzipping on the way if it is gzip compressed.
fn unpack(raw: &Path, out: &Path) -> Result<u64, RefreshError> {
    let mut reader = BufReader::new(File::open(raw)?);
    let gzipped = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    let mut writer = BufWriter::new(File::create(out)?);

    let copied = if gzipped {
        io::copy(&mut GzDecoder::new(reader), &mut writer)
            .map_err(|e| RefreshError::Fetch(format!("gunzip failed: {}", e)))?
    } else {
        io::copy(&mut reader, &mut writer)?
    };
    writer.flush()?;
    Ok(copied)
}

#[async_trait]
impl RefreshSource for HttpRefreshSource {
    async fn latest_modified(&self) -> Result<DateTime<Utc>, RefreshError> {
        let resp = self
            .client
            .head(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RefreshError::Check(e.to_string()))?;

        let value = resp
            .headers()
            .get(LAST_MODIFIED)
            .ok_or_else(|| RefreshError::Check("response has no Last-Modified header".to_string()))?
            .to_str()
            .map_err(|e| RefreshError::Check(e.to_string()))?;

        parse_http_date(value)
    }

    async fn fetch(&self, dest: &Path) -> Result<(), RefreshError> {
        let raw = raw_path(dest);
        let part = part_path(dest);

        let result = async {
            let downloaded = self.download(&raw).await?;
            let (unpack_raw, unpack_part) = (raw.clone(), part.clone());
            let unpacked = tokio::task::spawn_blocking(move || unpack(&unpack_raw, &unpack_part))
                .await
                .map_err(|e| RefreshError::Fetch(format!("unpack task failed: {}", e)))??;
            tokio::fs::rename(&part, dest).await?;
            Ok::<_, RefreshError>((downloaded, unpacked))
        }
        .await;

        let _ = tokio::fs::remove_file(&raw).await;
        let (downloaded, unpacked) = match result {
            Ok(sizes) => sizes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        tracing::info!(
            "downloaded {} ({} bytes, {} on disk) to {}",
            self.url,
            downloaded,
            unpacked,
            dest.display()
        );
        Ok(())
    }
}
