//! # ShopSync Common
//!
//! Cross-cutting utilities shared by every layer. Currently this is the
//! resilience toolkit: the retry executor used around every outbound call
//! to a marketplace, supplier, or classifier endpoint.

pub mod resilience;

pub use resilience::retry::{Backoff, RetryConfig, RetryError, run_with_retry};
