//! Eprolo adapter.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use shopsync_core::SupplierClient;
use shopsync_domain::{Destination, Result, Supplier, SyncError};

use super::map_supplier_error;
use crate::http::HttpClient;

const DEFAULT_BASE_URL: &str = "https://api.eprolo.com";

pub struct EproloSupplier {
    http: HttpClient,
    api_key: String,
    base_url: String,
}

impl EproloSupplier {
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
impl SupplierClient for EproloSupplier {
    fn supplier(&self) -> Supplier {
        Supplier::Eprolo
    }

    async fn get_stock(&self, supplier_sku: &str) -> Result<i64> {
        let url = format!("{}/openapi/product/inventory?sku={supplier_sku}", self.base_url);
        let request = self.http.request(Method::GET, &url).bearer_auth(&self.api_key);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_supplier_error("eprolo", status, &body));
        }

        let stock: EproloStockResponse = response.json().await.map_err(|err| {
            SyncError::Internal(format!("unreadable eprolo stock response: {err}"))
        })?;
        Ok(stock.inventory)
    }

    async fn place_order(
        &self,
        supplier_sku: &str,
        quantity: i64,
        destination: &Destination,
    ) -> Result<String> {
        let url = format!("{}/openapi/order/create", self.base_url);
        let body = json!({
            "items": [{ "sku": supplier_sku, "quantity": quantity }],
            "consignee": {
                "name": destination.name,
                "address": destination.address_line,
                "city": destination.city,
                "zipCode": destination.postal_code,
                "country": destination.country_code,
            }
        });
        let request = self.http.request(Method::POST, &url).bearer_auth(&self.api_key).json(&body);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_supplier_error("eprolo", status, &body));
        }

        let order: EproloOrderResponse = response.json().await.map_err(|err| {
            SyncError::Internal(format!("unreadable eprolo order response: {err}"))
        })?;
        Ok(order.order_no)
    }
}

#[derive(Debug, Deserialize)]
struct EproloStockResponse {
    inventory: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EproloOrderResponse {
    order_no: String,
}
