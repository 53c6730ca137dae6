//! In-Memory Geolocation Database
//!
//! Implements GeoDatabase over a fixed map of addresses. Used for fixtures
//! and for exercising the lookup pipeline without a MaxMind file.

use crate::domain::entities::GeoRecord;
use crate::domain::ports::{GeoDatabase, LookupError};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Exact-match address database held in memory.
#[derive(Default)]
pub struct MemoryGeoDatabase {
    records: HashMap<IpAddr, GeoRecord>,
    broken: HashMap<IpAddr, String>,
    lookups: AtomicU64,
    closed: Arc<AtomicBool>,
}

impl MemoryGeoDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record for `ip`.
    pub fn with_record(mut self, ip: IpAddr, record: GeoRecord) -> Self {
        self.records.insert(ip, record);
        self
    }

    /// Make lookups of `ip` fail with a database error.
    pub fn with_broken(mut self, ip: IpAddr, reason: impl Into<String>) -> Self {
        self.broken.insert(ip, reason.into());
        self
    }

    /// Number of lookups served so far.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Flag raised when the database is dropped (closed).
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

impl GeoDatabase for MemoryGeoDatabase {
    fn lookup(&self, ip: IpAddr) -> Result<GeoRecord, LookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.broken.get(&ip) {
            return Err(LookupError::Database(reason.clone()));
        }

        self.records
            .get(&ip)
            .cloned()
            .ok_or(LookupError::NotFound(ip))
    }
}

impl Drop for MemoryGeoDatabase {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn mountain_view() -> GeoRecord {
        GeoRecord {
            city: "Mountain View".to_string(),
            country: "United States".to_string(),
            iso_code: "US".to_string(),
            latitude: 37.386,
            longitude: -122.0838,
            time_zone: "America/Los_Angeles".to_string(),
        }
    }

    #[test]
    fn test_lookup_hit() {
        let ip: IpAddr = "8.8.8.8".parse().unwrap();
        let db = MemoryGeoDatabase::new().with_record(ip, mountain_view());

        assert_eq!(db.lookup(ip).unwrap(), mountain_view());
        assert_eq!(db.lookup_count(), 1);
    }

    #[test]
    fn test_lookup_miss() {
        let db = MemoryGeoDatabase::new();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        assert_eq!(db.lookup(ip), Err(LookupError::NotFound(ip)));
    }

    #[test]
    fn test_lookup_broken() {
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        let db = MemoryGeoDatabase::new().with_broken(ip, "corrupt search tree");

        let err = db.lookup(ip).unwrap_err();
        assert_eq!(err.to_string(), "database error: corrupt search tree");
    }

    #[test]
    fn test_drop_raises_closed_flag() {
        let db = MemoryGeoDatabase::new();
        let closed = db.closed_flag();
        assert!(!closed.load(Ordering::SeqCst));

        drop(db);
        assert!(closed.load(Ordering::SeqCst));
    }
}
