//! Scheduler error types

use std::time::Duration;

use shopsync_domain::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler already running")]
    AlreadyRunning,

    #[error("scheduler not running")]
    NotRunning,

    #[error("operation timed out after {duration:?}")]
    Timeout {
        duration: Duration,
        #[source]
        source: tokio::time::error::Elapsed,
    },

    #[error("background task failed: {0}")]
    TaskJoinFailed(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl From<SchedulerError> for SyncError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                SyncError::Validation(err.to_string())
            }
            SchedulerError::Sync(inner) => inner,
            other => SyncError::Internal(other.to_string()),
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
