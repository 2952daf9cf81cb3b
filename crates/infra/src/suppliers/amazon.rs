//! Amazon-as-supplier adapter: some products are fulfilled by buying
//! retail and shipping direct to the customer.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use shopsync_core::SupplierClient;
use shopsync_domain::{Destination, Result, Supplier, SyncError};

use super::map_supplier_error;
use crate::http::HttpClient;

const DEFAULT_BASE_URL: &str = "https://ordering.amazon.com/api/v1";

pub struct AmazonSupplier {
    http: HttpClient,
    api_key: String,
    base_url: String,
}

impl AmazonSupplier {
    pub fn new(http: HttpClient, api_key: impl Into<String>) -> Self {
        Self { http, api_key: api_key.into(), base_url: DEFAULT_BASE_URL.to_string() }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SupplierClient for AmazonSupplier {
    fn supplier(&self) -> Supplier {
        Supplier::Amazon
    }

    async fn get_stock(&self, supplier_sku: &str) -> Result<i64> {
        let url = format!("{}/products/{supplier_sku}/availability", self.base_url);
        let request = self.http.request(Method::GET, &url).bearer_auth(&self.api_key);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_supplier_error("amazon", status, &body));
        }

        let availability: AvailabilityResponse = response.json().await.map_err(|err| {
            SyncError::Internal(format!("unreadable amazon availability response: {err}"))
        })?;
        // Retail listings expose a boolean plus a capped count.
        if !availability.in_stock {
            return Ok(0);
        }
        Ok(availability.quantity)
    }

    async fn place_order(
        &self,
        supplier_sku: &str,
        quantity: i64,
        destination: &Destination,
    ) -> Result<String> {
        let url = format!("{}/orders", self.base_url);
        let body = json!({
            "asin": supplier_sku,
            "quantity": quantity,
            "shippingAddress": {
                "recipient": destination.name,
                "line1": destination.address_line,
                "city": destination.city,
                "postalCode": destination.postal_code,
                "countryCode": destination.country_code,
            }
        });
        let request = self.http.request(Method::POST, &url).bearer_auth(&self.api_key).json(&body);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_supplier_error("amazon", status, &body));
        }

        let order: PurchaseResponse = response.json().await.map_err(|err| {
            SyncError::Internal(format!("unreadable amazon purchase response: {err}"))
        })?;
        Ok(order.purchase_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityResponse {
    in_stock: bool,
    #[serde(default)]
    quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseResponse {
    purchase_id: String,
}
