//! Background schedulers.
//!
//! Each scheduler owns one periodic loop: credential refresh sweeps,
//! inventory reconciliation sweeps, and marketplace order polling. All
//! three share the same lifecycle shape: `start` spawns the loop with a
//! fresh cancellation token, `stop` cancels it and awaits the handle
//! with a timeout, and dropping a running scheduler cancels the loop.

pub mod credential_scheduler;
pub mod error;
pub mod order_poller;
pub mod reconcile_scheduler;

pub use credential_scheduler::CredentialScheduler;
pub use error::{SchedulerError, SchedulerResult};
pub use order_poller::OrderPoller;
pub use reconcile_scheduler::ReconcileScheduler;

#[cfg(test)]
pub(crate) mod testutil;

use std::time::Duration;

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);
