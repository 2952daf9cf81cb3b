//! eBay adapter: OAuth token refresh, inventory quantity updates, and
//! order retrieval against the Sell APIs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use shopsync_core::MarketplaceClient;
use shopsync_domain::{
    constants, Credential, Destination, MarketplaceOrderPayload, Result, SyncError, TokenRefresh,
};
use tracing::{debug, warn};

use super::parse_money_cents;
use crate::http::HttpClient;

const DEFAULT_API_BASE: &str = "https://api.ebay.com";

pub struct EbayClient {
    http: HttpClient,
    client_id: String,
    client_secret: String,
    token_endpoint: String,
    api_base: String,
}

impl EbayClient {
    pub fn new(http: HttpClient, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_endpoint: constants::EBAY_TOKEN_ENDPOINT.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the client at a different host. Tests aim this at wiremock.
    #[must_use]
    pub fn with_base_urls(
        mut self,
        token_endpoint: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        self.token_endpoint = token_endpoint.into();
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl MarketplaceClient for EbayClient {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefresh> {
        let request = self
            .http
            .request(Method::POST, &self.token_endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)]);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_token_error(status, &body));
        }

        let token: EbayTokenResponse = response
            .json()
            .await
            .map_err(|err| SyncError::Internal(format!("unreadable token response: {err}")))?;

        let now = Utc::now();
        Ok(TokenRefresh {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            access_expires_at: now + Duration::seconds(token.expires_in),
            refresh_expires_at: token
                .refresh_token_expires_in
                .map(|secs| now + Duration::seconds(secs)),
        })
    }

    async fn update_listing_quantity(
        &self,
        credential: &Credential,
        marketplace_listing_id: &str,
        quantity: i64,
    ) -> Result<()> {
        let url = format!("{}/sell/inventory/v1/bulk_update_price_quantity", self.api_base);
        let body = json!({
            "requests": [{
                "sku": marketplace_listing_id,
                "shipToLocationAvailability": { "quantity": quantity }
            }]
        });

        let request = self
            .http
            .request(Method::POST, &url)
            .bearer_auth(&credential.access_token)
            .json(&body);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }
        debug!(listing_id = marketplace_listing_id, quantity, "ebay quantity updated");
        Ok(())
    }

    async fn get_new_orders(
        &self,
        credential: &Credential,
        since: DateTime<Utc>,
    ) -> Result<Vec<MarketplaceOrderPayload>> {
        let url = format!(
            "{}/sell/fulfillment/v1/order?filter=creationdate:%5B{}..%5D",
            self.api_base,
            since.to_rfc3339(),
        );

        let request = self.http.request(Method::GET, &url).bearer_auth(&credential.access_token);
        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }

        let orders: EbayOrdersResponse = response
            .json()
            .await
            .map_err(|err| SyncError::Internal(format!("unreadable orders response: {err}")))?;

        Ok(orders
            .orders
            .into_iter()
            .filter_map(|order| match order.into_payload(&credential.store_id) {
                Ok(payload) => Some(payload),
                Err(err) => {
                    warn!(error = %err, "skipping unparseable ebay order");
                    None
                }
            })
            .collect())
    }
}

fn map_token_error(status: StatusCode, body: &str) -> SyncError {
    if status == StatusCode::BAD_REQUEST && body.contains("invalid_grant") {
        return SyncError::CredentialExpired("ebay rejected the refresh token".into());
    }
    match status.as_u16() {
        401 | 403 => SyncError::CredentialExpired(format!("ebay token endpoint: HTTP {status}")),
        500..=599 => SyncError::Transient(format!("ebay token endpoint: HTTP {status}")),
        _ => SyncError::Validation(format!("ebay token endpoint: HTTP {status}: {body}")),
    }
}

fn map_api_error(status: StatusCode, body: &str) -> SyncError {
    match status.as_u16() {
        401 | 403 => SyncError::CredentialExpired(format!("ebay api: HTTP {status}")),
        404 => SyncError::NotFound(format!("ebay api: HTTP {status}")),
        429 => SyncError::Transient(format!("ebay api: HTTP {status}")),
        500..=599 => SyncError::Transient(format!("ebay api: HTTP {status}")),
        _ => SyncError::Validation(format!("ebay api: HTTP {status}: {body}")),
    }
}

#[derive(Debug, Deserialize)]
struct EbayTokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
    refresh_token_expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct EbayOrdersResponse {
    #[serde(default)]
    orders: Vec<EbayOrder>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EbayOrder {
    order_id: String,
    line_items: Vec<EbayLineItem>,
    pricing_summary: EbayPricingSummary,
    fulfillment_start_instructions: Vec<EbayFulfillmentInstruction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EbayLineItem {
    listing_id: String,
    sku: String,
    quantity: i64,
}

#[derive(Debug, Deserialize)]
struct EbayPricingSummary {
    total: EbayAmount,
}

#[derive(Debug, Deserialize)]
struct EbayAmount {
    value: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EbayFulfillmentInstruction {
    shipping_step: EbayShippingStep,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EbayShippingStep {
    ship_to: EbayShipTo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EbayShipTo {
    full_name: String,
    contact_address: EbayAddress,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EbayAddress {
    address_line1: String,
    city: String,
    postal_code: String,
    country_code: String,
}

impl EbayOrder {
    fn into_payload(self, store_id: &str) -> Result<MarketplaceOrderPayload> {
        let line_item = self
            .line_items
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::Validation(format!("order {} has no line items", self.order_id)))?;
        let instruction = self.fulfillment_start_instructions.into_iter().next().ok_or_else(
            || SyncError::Validation(format!("order {} has no shipping details", self.order_id)),
        )?;
        let total_cents = parse_money_cents(&self.pricing_summary.total.value).ok_or_else(|| {
            SyncError::Validation(format!(
                "order {} has an unparseable total '{}'",
                self.order_id, self.pricing_summary.total.value
            ))
        })?;

        let ship_to = instruction.shipping_step.ship_to;
        Ok(MarketplaceOrderPayload {
            marketplace_order_id: self.order_id,
            store_id: store_id.to_string(),
            listing_id: line_item.listing_id,
            product_sku: line_item.sku,
            quantity: line_item.quantity,
            total_cents,
            currency: self.pricing_summary.total.currency,
            destination: Destination {
                name: ship_to.full_name,
                address_line: ship_to.contact_address.address_line1,
                city: ship_to.contact_address.city,
                postal_code: ship_to.contact_address.postal_code,
                country_code: ship_to.contact_address.country_code,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> EbayClient {
        let http = HttpClient::builder()
            .base_backoff(std::time::Duration::from_millis(5))
            .max_attempts(2)
            .build()
            .expect("http client");
        EbayClient::new(http, "app-id", "app-secret")
            .with_base_urls(format!("{}/identity/v1/oauth2/token", server.uri()), server.uri())
    }

    fn credential() -> Credential {
        Credential {
            store_id: "store-1".into(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            access_expires_at: Utc::now() + ChronoDuration::seconds(7200),
            refresh_expires_at: Utc::now() + ChronoDuration::days(540),
        }
    }

    #[tokio::test]
    async fn token_refresh_parses_the_new_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/v1/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "expires_in": 7200,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let refreshed = client(&server).refresh_token("refresh").await.unwrap();

        assert_eq!(refreshed.access_token, "new-access");
        assert!(refreshed.refresh_token.is_none());
        assert!(refreshed.access_expires_at > Utc::now() + ChronoDuration::seconds(7000));
    }

    #[tokio::test]
    async fn invalid_grant_is_a_credential_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "the provided authorization refresh token is invalid"
            })))
            .mount(&server)
            .await;

        let err = client(&server).refresh_token("refresh").await.unwrap_err();
        assert!(matches!(err, SyncError::CredentialExpired(_)));
    }

    #[tokio::test]
    async fn quantity_update_sends_the_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sell/inventory/v1/bulk_update_price_quantity"))
            .and(header("authorization", "Bearer access"))
            .and(body_string_contains("\"quantity\":3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "responses": [{ "statusCode": 200 }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .update_listing_quantity(&credential(), "mkt-1", 3)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn orders_are_mapped_into_payloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "orders": [{
                    "orderId": "11-22-33",
                    "lineItems": [{ "listingId": "mkt-1", "sku": "sku-1", "quantity": 2 }],
                    "pricingSummary": { "total": { "value": "49.99", "currency": "USD" } },
                    "fulfillmentStartInstructions": [{
                        "shippingStep": {
                            "shipTo": {
                                "fullName": "Jane Doe",
                                "contactAddress": {
                                    "addressLine1": "1 Main St",
                                    "city": "Springfield",
                                    "postalCode": "12345",
                                    "countryCode": "US"
                                }
                            }
                        }
                    }]
                }]
            })))
            .mount(&server)
            .await;

        let orders = client(&server)
            .get_new_orders(&credential(), Utc::now() - ChronoDuration::hours(1))
            .await
            .unwrap();

        assert_eq!(orders.len(), 1);
        let order = &orders[0];
        assert_eq!(order.marketplace_order_id, "11-22-33");
        assert_eq!(order.store_id, "store-1");
        assert_eq!(order.total_cents, 4_999);
        assert_eq!(order.destination.city, "Springfield");
    }
}
