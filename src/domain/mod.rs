//! Domain Layer
//!
//! Entities and ports of the geolocation service. Nothing here knows about
//! MaxMind, HTTP or threads.

pub mod entities;
pub mod ports;
