//! Outbound HTTP plumbing shared by all remote clients.

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
