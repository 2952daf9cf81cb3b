//! Periodic inventory reconciliation sweeps.

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

pub struct ReconcileScheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
    sweep_timeout: Duration,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl ReconcileScheduler {
    pub fn new(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            // A sweep walks the whole catalog; give it room.
            sweep_timeout: Duration::from_secs(600),
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(interval_secs = self.interval.as_secs(), "starting reconcile scheduler");

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

    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("stopping reconcile scheduler");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            tokio::time::timeout(JOIN_TIMEOUT, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: JOIN_TIMEOUT, source })??;
        }

        info!("reconcile scheduler stopped");
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
                    debug!("reconcile sweep loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match tokio::time::timeout(sweep_timeout, engine.reconcile_inventory(None)).await {
                        Ok(Ok(report)) => {
                            if report.products > 0 {
                                info!(
                                    products = report.products,
                                    updated = report.updated,
                                    unchanged = report.unchanged,
                                    skipped = report.skipped,
                                    failed = report.failed,
                                    "reconcile sweep completed"
                                );
                            } else {
                                debug!("reconcile sweep found no active products");
                            }
                        }
                        Ok(Err(err)) => error!(error = %err, "reconcile sweep failed"),
                        Err(_) => warn!(
                            timeout_secs = sweep_timeout.as_secs(),
                            "reconcile sweep timed out"
                        ),
                    }
                }
            }
        }
    }
}

impl Drop for ReconcileScheduler {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            warn!("reconcile scheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
