//! Amazon adapter: LWA token refresh plus SP-API style listings and
//! orders calls. Fetching orders takes two calls per order because the
//! Orders API returns line items from a separate endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use shopsync_core::MarketplaceClient;
use shopsync_domain::{
    constants, Credential, Destination, MarketplaceOrderPayload, Result, SyncError, TokenRefresh,
};
use tracing::warn;

use super::parse_money_cents;
use crate::http::HttpClient;

const DEFAULT_API_BASE: &str = "https://sellingpartnerapi-na.amazon.com";

pub struct AmazonClient {
    http: HttpClient,
    client_id: String,
    client_secret: String,
    token_endpoint: String,
    api_base: String,
}

impl AmazonClient {
    pub fn new(http: HttpClient, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_endpoint: constants::AMAZON_TOKEN_ENDPOINT.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

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

    async fn fetch_order_items(
        &self,
        credential: &Credential,
        amazon_order_id: &str,
    ) -> Result<Vec<AmazonOrderItem>> {
        let url = format!("{}/orders/v0/orders/{amazon_order_id}/orderItems", self.api_base);
        let request = self
            .http
            .request(Method::GET, &url)
            .header("x-amz-access-token", &credential.access_token);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }

        let items: AmazonOrderItemsResponse = response
            .json()
            .await
            .map_err(|err| SyncError::Internal(format!("unreadable order items response: {err}")))?;
        Ok(items.payload.order_items)
    }
}

#[async_trait]
impl MarketplaceClient for AmazonClient {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefresh> {
        let request = self.http.request(Method::POST, &self.token_endpoint).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ]);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_token_error(status, &body));
        }

        let token: LwaTokenResponse = response
            .json()
            .await
            .map_err(|err| SyncError::Internal(format!("unreadable token response: {err}")))?;

        // LWA refresh tokens do not rotate.
        Ok(TokenRefresh {
            access_token: token.access_token,
            refresh_token: None,
            access_expires_at: Utc::now() + Duration::seconds(token.expires_in),
            refresh_expires_at: None,
        })
    }

    async fn update_listing_quantity(
        &self,
        credential: &Credential,
        marketplace_listing_id: &str,
        quantity: i64,
    ) -> Result<()> {
        let url =
            format!("{}/listings/2021-08-01/items/{marketplace_listing_id}", self.api_base);
        let body = json!({
            "productType": "PRODUCT",
            "patches": [{
                "op": "replace",
                "path": "/attributes/fulfillment_availability",
                "value": [{ "fulfillment_channel_code": "DEFAULT", "quantity": quantity }]
            }]
        });

        let request = self
            .http
            .request(Method::PATCH, &url)
            .header("x-amz-access-token", &credential.access_token)
            .json(&body);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }
        Ok(())
    }

    async fn get_new_orders(
        &self,
        credential: &Credential,
        since: DateTime<Utc>,
    ) -> Result<Vec<MarketplaceOrderPayload>> {
        let url = format!(
            "{}/orders/v0/orders?CreatedAfter={}&OrderStatuses=Unshipped",
            self.api_base,
            since.to_rfc3339(),
        );
        let request = self
            .http
            .request(Method::GET, &url)
            .header("x-amz-access-token", &credential.access_token);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }

        let orders: AmazonOrdersResponse = response
            .json()
            .await
            .map_err(|err| SyncError::Internal(format!("unreadable orders response: {err}")))?;

        let mut payloads = Vec::with_capacity(orders.payload.orders.len());
        for order in orders.payload.orders {
            let items = self.fetch_order_items(credential, &order.amazon_order_id).await?;
            match build_payload(&credential.store_id, order, items) {
                Ok(payload) => payloads.push(payload),
                Err(err) => warn!(error = %err, "skipping unparseable amazon order"),
            }
        }
        Ok(payloads)
    }
}

fn build_payload(
    store_id: &str,
    order: AmazonOrder,
    items: Vec<AmazonOrderItem>,
) -> Result<MarketplaceOrderPayload> {
    let item = items.into_iter().next().ok_or_else(|| {
        SyncError::Validation(format!("order {} has no line items", order.amazon_order_id))
    })?;
    let total = order.order_total.ok_or_else(|| {
        SyncError::Validation(format!("order {} has no total", order.amazon_order_id))
    })?;
    let address = order.shipping_address.ok_or_else(|| {
        SyncError::Validation(format!("order {} has no shipping address", order.amazon_order_id))
    })?;
    let total_cents = parse_money_cents(&total.amount).ok_or_else(|| {
        SyncError::Validation(format!(
            "order {} has an unparseable total '{}'",
            order.amazon_order_id, total.amount
        ))
    })?;

    Ok(MarketplaceOrderPayload {
        marketplace_order_id: order.amazon_order_id,
        store_id: store_id.to_string(),
        listing_id: item.asin,
        product_sku: item.seller_sku,
        quantity: item.quantity_ordered,
        total_cents,
        currency: total.currency_code,
        destination: Destination {
            name: address.name,
            address_line: address.address_line1,
            city: address.city,
            postal_code: address.postal_code,
            country_code: address.country_code,
        },
    })
}

fn map_token_error(status: StatusCode, body: &str) -> SyncError {
    if status == StatusCode::BAD_REQUEST && body.contains("invalid_grant") {
        return SyncError::CredentialExpired("amazon rejected the refresh token".into());
    }
    match status.as_u16() {
        401 | 403 => SyncError::CredentialExpired(format!("lwa token endpoint: HTTP {status}")),
        500..=599 => SyncError::Transient(format!("lwa token endpoint: HTTP {status}")),
        _ => SyncError::Validation(format!("lwa token endpoint: HTTP {status}: {body}")),
    }
}

fn map_api_error(status: StatusCode, body: &str) -> SyncError {
    match status.as_u16() {
        401 | 403 => SyncError::CredentialExpired(format!("amazon api: HTTP {status}")),
        404 => SyncError::NotFound(format!("amazon api: HTTP {status}")),
        429 => SyncError::Transient(format!("amazon api: HTTP {status}")),
        500..=599 => SyncError::Transient(format!("amazon api: HTTP {status}")),
        _ => SyncError::Validation(format!("amazon api: HTTP {status}: {body}")),
    }
}

#[derive(Debug, Deserialize)]
struct LwaTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct AmazonOrdersResponse {
    payload: AmazonOrdersPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmazonOrdersPayload {
    #[serde(default)]
    orders: Vec<AmazonOrder>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmazonOrder {
    amazon_order_id: String,
    order_total: Option<AmazonMoney>,
    shipping_address: Option<AmazonAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmazonMoney {
    amount: String,
    currency_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmazonAddress {
    name: String,
    address_line1: String,
    city: String,
    postal_code: String,
    country_code: String,
}

#[derive(Debug, Deserialize)]
struct AmazonOrderItemsResponse {
    payload: AmazonOrderItemsPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmazonOrderItemsPayload {
    #[serde(default)]
    order_items: Vec<AmazonOrderItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmazonOrderItem {
    #[serde(rename = "ASIN")]
    asin: String,
    #[serde(rename = "SellerSKU")]
    seller_sku: String,
    quantity_ordered: i64,
}
