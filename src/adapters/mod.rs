//! Adapters Layer
//!
//! Inbound adapters drive the application (HTTP); outbound adapters
//! implement the domain ports (MaxMind files, refresh sources).

pub mod inbound;
pub mod outbound;
