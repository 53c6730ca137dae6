//! Lookup Dispatcher - Worker pool use case
//!
//! A fixed pool of worker threads serves lookup requests from a shared
//! intake queue. Each request carries its own one-shot reply channel.

use crate::domain::entities::{FailureKind, LookupResult};
use crate::domain::ports::LookupError;
use crate::infrastructure::ResourceGuard;
use crossbeam_channel::{Receiver, Sender};
use std::net::IpAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of worker threads
    pub workers: usize,
    /// How long a caller waits for its reply (None = forever)
    pub timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 300,
            timeout: None,
        }
    }
}

/// One queued lookup.
struct LookupRequest {
    ip: String,
    reply: oneshot::Sender<LookupResult>,
}

/// Fan-out/fan-in front of the worker pool.
///
/// `submit` may be called from any number of tasks concurrently. Each
/// request is served by exactly one worker with at most one lookup.
pub struct LookupDispatcher {
    intake: Sender<LookupRequest>,
    workers: Vec<JoinHandle<()>>,
    timeout: Option<Duration>,
}

impl LookupDispatcher {
    /// Spawn the worker pool.
    pub fn start(guard: Arc<ResourceGuard>, config: DispatcherConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(config.workers > 0, "worker pool size must be positive");

        let (intake, queue) = crossbeam_channel::unbounded::<LookupRequest>();
        let mut workers = Vec::with_capacity(config.workers);

        for id in 0..config.workers {
            let queue = queue.clone();
            let guard = guard.clone();
            let handle = std::thread::Builder::new()
                .name(format!("lookup-worker-{}", id))
                .spawn(move || worker_loop(queue, guard))?;
            workers.push(handle);
        }

        tracing::info!("lookup worker pool started ({} workers)", config.workers);

        Ok(Self {
            intake,
            workers,
            timeout: config.timeout,
        })
    }

    /// Number of workers in the pool.
    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }

    /// Number of requests waiting for a worker.
    pub fn queued(&self) -> usize {
        self.intake.len()
    }

    /// Look up `ip` and wait for the reply.
    pub async fn submit(&self, ip: impl Into<String>) -> LookupResult {
        let ip = ip.into();
        let rx = match self.enqueue(ip.clone()) {
            Ok(rx) => rx,
            Err(failure) => return failure,
        };

        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(reply) => reply.unwrap_or_else(|_| dropped(ip)),
                Err(_) => {
                    tracing::warn!("lookup of {} timed out after {:?}", ip, limit);
                    LookupResult::failure(ip, FailureKind::Internal, "lookup timed out")
                }
            },
            None => rx.await.unwrap_or_else(|_| dropped(ip)),
        }
    }

    /// Blocking variant of [`submit`](Self::submit) for synchronous callers.
    ///
    /// Must not be called from inside an async runtime.
    pub fn submit_blocking(&self, ip: impl Into<String>) -> LookupResult {
        let ip = ip.into();
        match self.enqueue(ip.clone()) {
            Ok(rx) => rx.blocking_recv().unwrap_or_else(|_| dropped(ip)),
            Err(failure) => failure,
        }
    }

    fn enqueue(&self, ip: String) -> Result<oneshot::Receiver<LookupResult>, LookupResult> {
        let (reply, rx) = oneshot::channel();
        self.intake
            .send(LookupRequest { ip, reply })
            .map_err(|e| {
                LookupResult::failure(
                    e.into_inner().ip,
                    FailureKind::Internal,
                    "lookup service unavailable",
                )
            })?;
        Ok(rx)
    }

    /// Close the intake and join the workers.
    ///
    /// Requests already queued are still answered.
    pub fn shutdown(self) {
        let Self { intake, workers, .. } = self;
        drop(intake);
        let count = workers.len();
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("lookup worker panicked during shutdown");
            }
        }
        tracing::info!("lookup worker pool stopped ({} workers)", count);
    }

    /// Close the intake and wait up to `limit` for the workers to finish.
    ///
    /// Queued requests and lookups whose caller already timed out are
    /// allowed to complete. Returns false when the pool was still busy at
    /// the deadline; its threads are then left to the process exit.
    pub async fn drain(self, limit: Duration) -> bool {
        let (done, finished) = oneshot::channel();
        let joiner = std::thread::Builder::new()
            .name("lookup-drain".to_string())
            .spawn(move || {
                self.shutdown();
                let _ = done.send(());
            });
        if let Err(e) = joiner {
            tracing::error!("cannot spawn lookup drain thread: {}", e);
            return false;
        }

        match tokio::time::timeout(limit, finished).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => false,
            Err(_) => {
                tracing::warn!("lookup workers still busy after {:?}", limit);
                false
            }
        }
    }
}

fn dropped(ip: String) -> LookupResult {
    LookupResult::failure(ip, FailureKind::Internal, "lookup worker dropped the request")
}

fn worker_loop(queue: Receiver<LookupRequest>, guard: Arc<ResourceGuard>) {
    // recv fails once every sender is gone and the queue is empty
    while let Ok(request) = queue.recv() {
        let result = serve(&guard, &request.ip);
        if request.reply.send(result).is_err() {
            tracing::debug!("caller for {} went away before the reply", request.ip);
        }
    }
}

/// Serve one lookup against the current generation.
pub fn serve(guard: &ResourceGuard, input: &str) -> LookupResult {
    let ip: IpAddr = match input.trim().parse() {
        Ok(ip) => ip,
        Err(e) => return LookupResult::failure(input, FailureKind::InvalidInput, e.to_string()),
    };

    let handle = guard.current();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handle.lookup(ip)));

    match outcome {
        Ok(Ok(record)) => LookupResult::success(input, record),
        Ok(Err(e @ LookupError::NotFound(_))) => {
            tracing::debug!("{}", e);
            LookupResult::failure(input, FailureKind::NotFound, e.to_string())
        }
        Ok(Err(e @ LookupError::Database(_))) => {
            tracing::error!("lookup of {} failed: {}", input, e);
            LookupResult::failure(input, FailureKind::Internal, e.to_string())
        }
        Err(_) => {
            tracing::error!("lookup of {} panicked", input);
            LookupResult::failure(input, FailureKind::Internal, "lookup panicked")
        }
    }
}
