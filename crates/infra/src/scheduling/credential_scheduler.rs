//! Periodic credential refresh sweeps.
//!
//! Walks the active stores on an interval and refreshes every access
//! token that expires inside the lookahead window, so on-demand callers
//! rarely pay the refresh latency themselves.

use std::sync::Arc;
use std::time::Duration;

use shopsync_core::SyncEngine;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};
use super::JOIN_TIMEOUT;

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

pub struct CredentialScheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
    sweep_timeout: Duration,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl CredentialScheduler {
    pub fn new(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            sweep_timeout: Duration::from_secs(120),
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the sweep loop.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if already started.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(interval_secs = self.interval.as_secs(), "starting credential scheduler");

        // Fresh token so the scheduler can be restarted after a stop.
        self.cancellation_token = CancellationToken::new();

        let engine = Arc::clone(&self.engine);
        let interval = self.interval;
        let sweep_timeout = self.sweep_timeout;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::sweep_loop(engine, interval, sweep_timeout, cancel).await;
        });
        *self.task_handle.lock().await = Some(handle);

        Ok(())
    }

    /// Stop the loop and await its completion.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRunning`] if not started.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("stopping credential scheduler");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            tokio::time::timeout(JOIN_TIMEOUT, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: JOIN_TIMEOUT, source })??;
        }

        info!("credential scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    async fn sweep_loop(
        engine: Arc<SyncEngine>,
        interval: Duration,
        sweep_timeout: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("credential sweep loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match tokio::time::timeout(sweep_timeout, engine.refresh_credentials()).await {
                        Ok(Ok(report)) => {
                            if report.due > 0 {
                                info!(
                                    due = report.due,
                                    refreshed = report.refreshed,
                                    in_flight = report.in_flight,
                                    deactivated = report.deactivated,
                                    failed = report.failed,
                                    "credential sweep completed"
                                );
                            } else {
                                debug!("credential sweep found nothing due");
                            }
                        }
                        Ok(Err(err)) => error!(error = %err, "credential sweep failed"),
                        Err(_) => warn!(
                            timeout_secs = sweep_timeout.as_secs(),
                            "credential sweep timed out"
                        ),
                    }
                }
            }
        }
    }
}

impl Drop for CredentialScheduler {
    fn drop(&mut self) {
        // Best-effort cleanup; the handle cannot be awaited here.
        if !self.cancellation_token.is_cancelled() {
            warn!("credential scheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
