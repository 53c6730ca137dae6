//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use geoip_server::adapters::outbound::MemoryGeoDatabase;
use geoip_server::domain::ports::{DatabaseHandle, DatabaseOpener, RefreshError, RefreshSource};
use geoip_server::{GeoRecord, Generation, ResourceGuard};
use parking_lot::Mutex;
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const GOOGLE_DNS: &str = "8.8.8.8";

pub fn mountain_view() -> GeoRecord {
    GeoRecord {
        city: "Mountain View".to_string(),
        country: "United States".to_string(),
        iso_code: "US".to_string(),
        latitude: 37.386,
        longitude: -122.0838,
        time_zone: "America/Los_Angeles".to_string(),
    }
}

pub fn record_in(city: &str) -> GeoRecord {
    GeoRecord {
        city: city.to_string(),
        ..mountain_view()
    }
}

/// Database resolving 8.8.8.8 to `city`.
pub fn db_with_city(city: &str) -> MemoryGeoDatabase {
    MemoryGeoDatabase::new().with_record(GOOGLE_DNS.parse().unwrap(), record_in(city))
}

pub fn guard_with(db: MemoryGeoDatabase) -> Arc<ResourceGuard> {
    Arc::new(ResourceGuard::new(
        Arc::new(db),
        Generation::initial("GeoLite2-City.mmdb", None),
    ))
}

pub fn guard_with_modified(db: MemoryGeoDatabase, modified: DateTime<Utc>) -> Arc<ResourceGuard> {
    Arc::new(ResourceGuard::new(
        Arc::new(db),
        Generation::initial("GeoLite2-City.mmdb", Some(modified)),
    ))
}

pub fn march(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

/// Opens fixture files of the form `city:<name>`.
///
/// Anything else is rejected as a corrupt database.
pub fn open_fixture(path: &Path) -> anyhow::Result<DatabaseHandle> {
    let text = std::fs::read_to_string(path)?;
    match text.trim().strip_prefix("city:") {
        Some(city) => Ok(Arc::new(db_with_city(city))),
        None => anyhow::bail!("corrupt database {}", path.display()),
    }
}

pub fn fixture_opener() -> Arc<dyn DatabaseOpener> {
    Arc::new(open_fixture)
}

/// Refresh source whose answers are set by the test.
pub struct ScriptedSource {
    modified: Mutex<Result<DateTime<Utc>, String>>,
    body: Mutex<Option<Vec<u8>>>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(modified: DateTime<Utc>, body: &str) -> Self {
        Self {
            modified: Mutex::new(Ok(modified)),
            body: Mutex::new(Some(body.as_bytes().to_vec())),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn publish(&self, modified: DateTime<Utc>, body: &str) {
        *self.modified.lock() = Ok(modified);
        *self.body.lock() = Some(body.as_bytes().to_vec());
    }

    pub fn fail_check(&self, reason: &str) {
        *self.modified.lock() = Err(reason.to_string());
    }

    pub fn fail_fetch(&self) {
        *self.body.lock() = None;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshSource for ScriptedSource {
    async fn latest_modified(&self) -> Result<DateTime<Utc>, RefreshError> {
        self.modified.lock().clone().map_err(RefreshError::Check)
    }

    async fn fetch(&self, dest: &Path) -> Result<(), RefreshError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let body = self.body.lock().clone();
        match body {
            Some(bytes) => {
                tokio::fs::write(dest, bytes).await?;
                Ok(())
            }
            None => Err(RefreshError::Fetch("connection reset".to_string())),
        }
    }
}

pub fn city_of(guard: &ResourceGuard) -> String {
    let ip: IpAddr = GOOGLE_DNS.parse().unwrap();
    guard.current().lookup(ip).unwrap().city
}
