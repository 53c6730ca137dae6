//! geoip-server Library
//!
//! IP geolocation service: a fixed worker pool answers lookups against a
//! MaxMind database that a background scheduler swaps for newer generations.
//! This module exposes the components for integration tests and embedding.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{LookupDispatcher, RefreshScheduler};
pub use config::load_config;
pub use domain::entities::{FailureKind, GeoRecord, Generation, LookupResult};
pub use domain::ports::{DatabaseHandle, DatabaseOpener, GeoDatabase, RefreshSource};
pub use infrastructure::{ResourceGuard, ShutdownController};
