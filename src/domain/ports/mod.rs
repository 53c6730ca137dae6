mod geo_database;
mod refresh_source;

pub use geo_database::{DatabaseHandle, DatabaseOpener, GeoDatabase, LookupError};
pub use refresh_source::{RefreshError, RefreshSource};
