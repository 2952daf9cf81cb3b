//! HTTP client for the external supplier-classification service.
//!
//! The classifier is advisory only. The order router times the call out
//! and validates the suggestion, so this client stays a thin wrapper.

use async_trait::async_trait;
use reqwest::Method;
use shopsync_core::SupplierClassifier;
use shopsync_domain::{OrderContext, Result, SupplierSuggestion, SyncError};

use crate::http::HttpClient;

pub struct ClassifierClient {
    http: HttpClient,
    base_url: String,
}

impl ClassifierClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }
}

#[async_trait]
impl SupplierClassifier for ClassifierClient {
    async fn suggest_supplier(&self, context: &OrderContext) -> Result<SupplierSuggestion> {
        let url = format!("{}/classify", self.base_url);
        let request = self.http.request(Method::POST, &url).json(context);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Transient(format!("classifier: HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|err| SyncError::Transient(format!("unreadable classifier response: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> ClassifierClient {
        let http = HttpClient::builder()
            .base_backoff(std::time::Duration::from_millis(5))
            .max_attempts(2)
            .build()
            .expect("http client");
        ClassifierClient::new(http, server.uri())
    }

    fn context() -> OrderContext {
        OrderContext {
            product_sku: "sku-1".into(),
            supplier_sku: "cj-sku-1".into(),
            quantity: 2,
            destination_country: "US".into(),
        }
    }

    #[tokio::test]
    async fn suggestions_are_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .and(body_string_contains("\"destination_country\":\"US\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "supplier": "eprolo",
                "reason": "cheaper shipping to the US",
                "estimated_cost_cents": 899,
                "estimated_days": 6
            })))
            .mount(&server)
            .await;

        let suggestion = client(&server).suggest_supplier(&context()).await.unwrap();

        assert_eq!(suggestion.supplier, "eprolo");
        assert_eq!(suggestion.estimated_cost_cents, Some(899));
    }

    #[tokio::test]
    async fn failures_surface_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).suggest_supplier(&context()).await.unwrap_err();
        assert!(matches!(err, SyncError::Transient(_)));
    }
}
