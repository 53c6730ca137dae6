//! Application Layer
//!
//! Use cases orchestrating the domain ports: serving lookups and rotating
//! the database.

mod lookup_dispatcher;
mod refresh_scheduler;

pub use lookup_dispatcher::{serve, DispatcherConfig, LookupDispatcher};
pub use refresh_scheduler::{RefreshConfig, RefreshOutcome, RefreshScheduler, SchedulerState};
