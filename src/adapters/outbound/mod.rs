mod file_refresh_source;
mod http_refresh_source;
mod maxmind_geo_database;
mod memory_geo_database;

pub use file_refresh_source::FileRefreshSource;
pub use http_refresh_source::HttpRefreshSource;
pub use maxmind_geo_database::{MaxMindGeoDatabase, MaxMindOpener};
pub use memory_geo_database::MemoryGeoDatabase;
