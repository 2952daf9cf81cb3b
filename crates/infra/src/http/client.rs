//! Outbound HTTP client.
//!
//! Thin wrapper over reqwest that funnels every send through the shared
//! retry executor: transient transport failures and 5xx responses are
//! retried with backoff, everything else is returned to the caller, which
//! owns the endpoint's status vocabulary.

use std::time::Duration;

use reqwest::{Client as ReqwestClient, IntoUrl, Method, RequestBuilder, Response};
use shopsync_common::{run_with_retry, Backoff, RetryConfig, RetryError};
use shopsync_domain::SyncError;
use tracing::debug;

use crate::errors::InfraError;

#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    retry: RetryConfig,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Request builder on the underlying reqwest client.
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send a request, retrying transient failures.
    ///
    /// A 5xx response counts as transient and surfaces as
    /// [`SyncError::Transient`] once the attempts run out; any other
    /// response comes back `Ok` for the caller to interpret.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, SyncError> {
        run_with_retry(&self.retry, SyncError::is_transient, || attempt(&builder))
            .await
            .map_err(RetryError::into_inner)
    }
}

async fn attempt(builder: &RequestBuilder) -> Result<Response, SyncError> {
    let request = builder.try_clone().ok_or_else(|| {
        SyncError::Internal("request body cannot be cloned; buffer it to enable retries".into())
    })?;

    let response = request.send().await.map_err(|err| SyncError::from(InfraError::from(err)))?;

    let status = response.status();
    debug!(%status, url = %response.url(), "received HTTP response");
    if status.is_server_error() {
        return Err(SyncError::Transient(format!("HTTP {status} from {}", response.url())));
    }
    Ok(response)
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: u32,
    base_backoff: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            user_agent: None,
        }
    }
}

impl HttpClientBuilder {
    /// Per-request timeout, applied by reqwest to each attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts, including the first.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Initial delay of the exponential backoff between attempts.
    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpClient, SyncError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder.build().map_err(|err| SyncError::from(InfraError::from(err)))?;

        let retry = RetryConfig {
            max_attempts: self.max_attempts,
            backoff: Backoff::Exponential {
                initial: self.base_backoff,
                factor: 2.0,
                max: Duration::from_secs(10),
            },
            jitter: true,
        };
        Ok(HttpClient { client, retry })
    }
}
