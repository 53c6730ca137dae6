//! Infrastructure Layer
//!
//! Cross-cutting concerns and infrastructure components.

pub mod resource_guard;
pub mod shutdown;

pub use resource_guard::ResourceGuard;
pub use shutdown::{shutdown_signal, ShutdownController};
