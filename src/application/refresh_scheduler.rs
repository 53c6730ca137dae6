//! Refresh Scheduler - Database rotation use case
//!
//! Periodically checks the refresh source for a newer generation, opens it
//! and swaps it into the resource guard. A failed refresh leaves the active
//! generation serving.

use crate::domain::entities::Generation;
use crate::domain::ports::{DatabaseOpener, RefreshError, RefreshSource};
use crate::infrastructure::{ResourceGuard, ShutdownController};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Refresh scheduler configuration.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between freshness checks
    pub interval: Duration,
    /// Directory receiving downloaded generations
    pub data_dir: PathBuf,
    /// File name prefix of downloaded generations
    pub file_prefix: String,
    /// Delete the superseded file after a successful swap
    pub remove_superseded: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
            data_dir: PathBuf::from("."),
            file_prefix: "GeoLite2-City".to_string(),
            remove_superseded: true,
        }
    }
}

impl RefreshConfig {
    /// Path of the file backing generation `sequence`.
    pub fn candidate_path(&self, sequence: u64) -> PathBuf {
        self.data_dir.join(format!("{}-{}.mmdb", self.file_prefix, sequence))
    }
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick
    Idle,
    /// Attempting to install a new generation
    Refreshing,
}

/// Result of one refresh attempt that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The active generation is the newest available
    UpToDate,
    /// A new generation was swapped in
    Installed(Generation),
    /// Another refresh was already running
    Busy,
}

/// Periodic database refresher.
///
/// The only shared state it touches is the resource guard, through `swap`.
pub struct RefreshScheduler {
    guard: Arc<ResourceGuard>,
    source: Arc<dyn RefreshSource>,
    opener: Arc<dyn DatabaseOpener>,
    config: RefreshConfig,
    /// File the process started with; downloads never overwrite it
    startup_path: PathBuf,
    refreshing: AtomicBool,
}

/// Resets the refreshing flag when an attempt ends, however it ends.
struct RefreshingFlag<'a>(&'a AtomicBool);

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RefreshScheduler {
    pub fn new(
        guard: Arc<ResourceGuard>,
        source: Arc<dyn RefreshSource>,
        opener: Arc<dyn DatabaseOpener>,
        config: RefreshConfig,
    ) -> Self {
        let startup_path = guard.generation().path;
        Self {
            guard,
            source,
            opener,
            config,
            startup_path,
            refreshing: AtomicBool::new(false),
        }
    }

    /// Sequence number and path for the generation after `active`.
    ///
    /// Numbers whose file is the active or startup database are skipped.
    fn next_candidate(&self, active: &Generation) -> (u64, PathBuf) {
        let mut sequence = active.sequence + 1;
        loop {
            let path = self.config.candidate_path(sequence);
            if !same_location(&path, &active.path) && !same_location(&path, &self.startup_path) {
                return (sequence, path);
            }
            tracing::debug!("{} is in use, skipping sequence {}", path.display(), sequence);
            sequence += 1;
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.refreshing.load(Ordering::SeqCst) {
            SchedulerState::Refreshing
        } else {
            SchedulerState::Idle
        }
    }

    /// Run one refresh attempt.
    pub async fn refresh_once(&self) -> Result<RefreshOutcome, RefreshError> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(RefreshOutcome::Busy);
        }
        let _flag = RefreshingFlag(&self.refreshing);

        let modified = self.source.latest_modified().await?;
        let active = self.guard.generation();
        if !active.is_superseded_by(modified) {
            tracing::debug!(
                "database generation {} is up to date (source modified {})",
                active.sequence,
                modified
            );
            return Ok(RefreshOutcome::UpToDate);
        }

        let (sequence, path) = self.next_candidate(&active);
        tracing::info!(
            "newer database available (modified {}), fetching to {}",
            modified,
            path.display()
        );
        self.source.fetch(&path).await?;

        let opener = self.opener.clone();
        let open_path = path.clone();
        let opened = tokio::task::spawn_blocking(move || opener.open(&open_path))
            .await
            .map_err(|e| RefreshError::Open {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let handle = match opened {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    tracing::debug!("could not remove rejected {}: {}", path.display(), rm);
                }
                return Err(RefreshError::Open {
                    path,
                    reason: format!("{:#}", e),
                });
            }
        };

        let generation = Generation {
            sequence,
            ..active.next(path, modified)
        };
        let previous = self.guard.swap(handle, generation.clone());
        // Close the superseded generation; in-flight lookups keep their own reference
        drop(previous);

        tracing::info!(
            "installed database generation {} from {}",
            generation.sequence,
            generation.path.display()
        );

        if self.config.remove_superseded
            && active.is_managed()
            && active.path != generation.path
        {
            match tokio::fs::remove_file(&active.path).await {
                Ok(()) => tracing::debug!("removed superseded {}", active.path.display()),
                Err(e) => tracing::warn!(
                    "failed to remove superseded {}: {}",
                    active.path.display(),
                    e
                ),
            }
        }

        Ok(RefreshOutcome::Installed(generation))
    }

    /// One scheduled attempt. Failures are logged and left for the next tick.
    async fn tick(&self) {
        match self.refresh_once().await {
            Ok(RefreshOutcome::Installed(_)) | Ok(RefreshOutcome::UpToDate) => {}
            Ok(RefreshOutcome::Busy) => {
                tracing::debug!("refresh already in progress, skipping tick")
            }
            Err(e) => tracing::warn!(
                "database refresh failed, keeping generation {}: {}",
                self.guard.generation().sequence,
                e
            ),
        }
    }

    /// Start the background refresh loop.
    ///
    /// The first check happens one interval after start. The loop exits at
    /// the first tick boundary after shutdown is signalled.
    pub fn start(self: Arc<Self>, shutdown: ShutdownController) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.config.interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!("refresh scheduler started (interval {:?})", period);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.wait() => break,
                    _ = ticker.tick() => {}
                }

                self.tick().await;
            }

            tracing::info!("refresh scheduler stopped");
        })
    }
}

/// Whether `a` and `b` name the same file, resolving their directories.
fn same_location(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (resolve(a), resolve(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn resolve(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::canonicalize(dir).ok().map(|dir| dir.join(name))
}
