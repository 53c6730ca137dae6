//! Resource Guard
//!
//! Owns the single database handle shared by every lookup worker and
//! replaced by the refresh scheduler.

use crate::domain::entities::Generation;
use crate::domain::ports::DatabaseHandle;
use parking_lot::Mutex;

struct Active {
    handle: DatabaseHandle,
    generation: Generation,
}

/// Guard around the current database generation.
///
/// Reads and swaps go through one mutex. The critical section is a pointer
/// clone or a pointer exchange, so workers never wait on a database load:
/// the scheduler opens the new generation before calling [`swap`].
///
/// A reader receives its own reference to the handle, so a swap that races
/// an in-flight lookup lets that lookup finish against the old generation.
/// The old database is released when its last reference is dropped.
///
/// [`swap`]: ResourceGuard::swap
pub struct ResourceGuard {
    active: Mutex<Active>,
}

impl ResourceGuard {
    /// Create a guard around an already opened generation.
    pub fn new(handle: DatabaseHandle, generation: Generation) -> Self {
        Self {
            active: Mutex::new(Active { handle, generation }),
        }
    }

    /// The handle lookups should use right now.
    pub fn current(&self) -> DatabaseHandle {
        self.active.lock().handle.clone()
    }

    /// Marker of the generation backing [`current`](Self::current).
    pub fn generation(&self) -> Generation {
        self.active.lock().generation.clone()
    }

    /// Handle and generation read under the same lock.
    pub fn snapshot(&self) -> (DatabaseHandle, Generation) {
        let active = self.active.lock();
        (active.handle.clone(), active.generation.clone())
    }

    /// Install a new generation and return the handle it replaced.
    ///
    /// The caller owns the returned handle and closes it by dropping it.
    pub fn swap(&self, handle: DatabaseHandle, generation: Generation) -> DatabaseHandle {
        let mut active = self.active.lock();
        tracing::debug!(
            "swapping database generation {} -> {}",
            active.generation.sequence,
            generation.sequence
        );
        active.generation = generation;
        std::mem::replace(&mut active.handle, handle)
    }
}
