//! MaxMind GeoIP Database
//!
//! Implements GeoDatabase using a MaxMind GeoLite2 City database file.

use crate::domain::entities::GeoRecord;
use crate::domain::ports::{DatabaseHandle, DatabaseOpener, GeoDatabase, LookupError};
use anyhow::Context;
use maxminddb::{MaxMindDBError, Reader};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Language used for city and country names.
const NAME_LANGUAGE: &str = "en";

/// One opened GeoLite2 City generation.
///
/// The whole file is read into memory on open, so the file on disk may be
/// removed while the generation is still serving.
pub struct MaxMindGeoDatabase {
    reader: Reader<Vec<u8>>,
}

impl MaxMindGeoDatabase {
    /// Load a GeoIP database from a file path.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let reader = Reader::open_readfile(path)
            .with_context(|| format!("failed to open GeoIP database {}", path.display()))?;
        tracing::debug!(
            "opened {} (build_epoch={}, type={})",
            path.display(),
            reader.metadata.build_epoch,
            reader.metadata.database_type
        );
        Ok(Self { reader })
    }
}

#[derive(Debug, Deserialize)]
struct Named {
    iso_code: Option<String>,
    names: Option<BTreeMap<String, String>>,
}

impl Named {
    fn name(&self) -> String {
        self.names
            .as_ref()
            .and_then(|names| names.get(NAME_LANGUAGE))
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Location {
    latitude: Option<f64>,
    longitude: Option<f64>,
    time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CityResp {
    city: Option<Named>,
    country: Option<Named>,
    location: Option<Location>,
}

impl From<CityResp> for GeoRecord {
    fn from(resp: CityResp) -> Self {
        let city = resp.city.as_ref().map(Named::name).unwrap_or_default();
        let (country, iso_code) = match resp.country {
            Some(country) => (country.name(), country.iso_code.unwrap_or_default()),
            None => (String::new(), String::new()),
        };
        let (latitude, longitude, time_zone) = match resp.location {
            Some(loc) => (
                loc.latitude.unwrap_or_default(),
                loc.longitude.unwrap_or_default(),
                loc.time_zone.unwrap_or_default(),
            ),
            None => (0.0, 0.0, String::new()),
        };

        GeoRecord {
            city,
            country,
            iso_code,
            latitude,
            longitude,
            time_zone,
        }
    }
}

impl GeoDatabase for MaxMindGeoDatabase {
    fn lookup(&self, ip: IpAddr) -> Result<GeoRecord, LookupError> {
        match self.reader.lookup::<CityResp>(ip) {
            Ok(resp) => Ok(resp.into()),
            Err(MaxMindDBError::AddressNotFoundError(_)) => Err(LookupError::NotFound(ip)),
            Err(e) => Err(LookupError::Database(e.to_string())),
        }
    }
}

/// Opens GeoLite2 City files as [`MaxMindGeoDatabase`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxMindOpener;

impl DatabaseOpener for MaxMindOpener {
    fn open(&self, path: &Path) -> anyhow::Result<DatabaseHandle> {
        Ok(Arc::new(MaxMindGeoDatabase::open(path)?))
    }
}
