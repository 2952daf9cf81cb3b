//! Resilience primitives for outbound calls

pub mod retry;
