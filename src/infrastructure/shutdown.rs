//! Graceful Shutdown Handler
//!
//! A single latch that the HTTP server and the refresh scheduler wait on.
//! Lookups still in the worker pool are drained by
//! [`LookupDispatcher::drain`](crate::application::LookupDispatcher::drain).

use std::sync::Arc;
use tokio::sync::watch;

/// Shutdown latch shared by every long-running component.
///
/// Once tripped it stays tripped, so late waiters return immediately.
#[derive(Clone)]
pub struct ShutdownController {
    latch: Arc<watch::Sender<bool>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (latch, _) = watch::channel(false);
        Self {
            latch: Arc::new(latch),
        }
    }

    /// Trip the latch. Only the first call has an effect.
    pub fn shutdown(&self) {
        let tripped = self.latch.send_if_modified(|down| {
            if *down {
                false
            } else {
                *down = true;
                true
            }
        });
        if tripped {
            tracing::info!("initiating graceful shutdown");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.latch.borrow()
    }

    /// Resolves once shutdown has been initiated.
    pub async fn wait(&self) {
        let mut rx = self.latch.subscribe();
        // The sender lives in `self`, so this only returns once the latch is set
        let _ = rx.wait_for(|down| *down).await;
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Trip `controller` on Ctrl+C or SIGTERM.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    controller.shutdown();
}
