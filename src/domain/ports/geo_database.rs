//! Geolocation Database Port
//!
//! Defines the interface for an opened database generation and for opening
//! new generations from disk.

use crate::domain::entities::GeoRecord;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Errors produced by a single lookup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    #[error("address {0} not found in database")]
    NotFound(IpAddr),
    #[error("database error: {0}")]
    Database(String),
}

/// An opened generation of the geolocation database.
///
/// This is an outbound port that abstracts the on-disk format.
/// The database is closed when the last handle referring to it is dropped.
pub trait GeoDatabase: Send + Sync {
    /// Resolve an IP address to its location record.
    fn lookup(&self, ip: IpAddr) -> Result<GeoRecord, LookupError>;
}

/// Shared reference to an opened generation.
pub type DatabaseHandle = Arc<dyn GeoDatabase>;

/// Opens a database generation from a file.
pub trait DatabaseOpener: Send + Sync {
    fn open(&self, path: &Path) -> anyhow::Result<DatabaseHandle>;
}

impl<F> DatabaseOpener for F
where
    F: Fn(&Path) -> anyhow::Result<DatabaseHandle> + Send + Sync,
{
    fn open(&self, path: &Path) -> anyhow::Result<DatabaseHandle> {
        self(path)
    }
}
