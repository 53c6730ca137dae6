//! Domain Entities - Core lookup objects
//!
//! These entities represent the core concepts of the geolocation domain.
//! They have no dependency on the database format or the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Location data stored in the database for one network.
///
/// Names are the English variants as published in GeoLite2 City.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoRecord {
    /// City name (may be empty for country-level networks)
    pub city: String,
    /// Country name
    pub country: String,
    /// Country code (ISO 3166-1 alpha-2: BR, US, FR, etc)
    pub iso_code: String,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA time zone (e.g. "America/Los_Angeles")
    pub time_zone: String,
}

/// Why a lookup did not produce a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The input string is not an IP address
    InvalidInput,
    /// Valid IP with no matching network in the database
    NotFound,
    /// Database error, timeout or unavailable worker pool
    Internal,
}

/// Outcome of a single lookup, delivered exactly once to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    Success {
        ip: String,
        record: GeoRecord,
    },
    Failure {
        ip: String,
        kind: FailureKind,
        message: String,
    },
}

impl LookupResult {
    pub fn success(ip: impl Into<String>, record: GeoRecord) -> Self {
        Self::Success {
            ip: ip.into(),
            record,
        }
    }

    pub fn failure(ip: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            ip: ip.into(),
            kind,
            message: message.into(),
        }
    }

    /// The IP string exactly as the caller submitted it.
    pub fn ip(&self) -> &str {
        match self {
            Self::Success { ip, .. } | Self::Failure { ip, .. } => ip,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Wire status string ("success" or "fail").
    pub fn status(&self) -> &'static str {
        if self.is_success() {
            "success"
        } else {
            "fail"
        }
    }
}

/// One version of the on-disk database.
///
/// `sequence` counts installed downloads (0 is the database the process
/// started with). `modified` is the source's modification stamp, the only
/// value used to decide whether a candidate is newer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub sequence: u64,
    pub modified: Option<DateTime<Utc>>,
    pub path: PathBuf,
}

impl Generation {
    /// The generation the process starts with.
    pub fn initial(path: impl Into<PathBuf>, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            sequence: 0,
            modified,
            path: path.into(),
        }
    }

    /// The generation that follows this one, backed by `path`.
    pub fn next(&self, path: impl Into<PathBuf>, modified: DateTime<Utc>) -> Self {
        Self {
            sequence: self.sequence + 1,
            modified: Some(modified),
            path: path.into(),
        }
    }

    /// Whether a candidate stamped `candidate` is strictly newer.
    ///
    /// An unknown stamp is superseded by anything.
    pub fn is_superseded_by(&self, candidate: DateTime<Utc>) -> bool {
        match self.modified {
            Some(active) => candidate > active,
            None => true,
        }
    }

    /// Whether the file was produced by the refresh scheduler.
    pub fn is_managed(&self) -> bool {
        self.sequence > 0
    }
}
