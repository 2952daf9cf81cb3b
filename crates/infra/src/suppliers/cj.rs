//! CJ Dropshipping adapter.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use shopsync_core::SupplierClient;
use shopsync_domain::{Destination, Result, Supplier, SyncError};

use super::map_supplier_error;
use crate::http::HttpClient;

const DEFAULT_BASE_URL: &str = "https://developers.cjdropshipping.com/api2.0/v1";

pub struct CjSupplier {
    http: HttpClient,
    api_key: String,
    base_url: String,
}

impl CjSupplier {
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
impl SupplierClient for CjSupplier {
    fn supplier(&self) -> Supplier {
        Supplier::Cj
    }

    async fn get_stock(&self, supplier_sku: &str) -> Result<i64> {
        let url = format!("{}/product/stock/queryBySku?sku={supplier_sku}", self.base_url);
        let request =
            self.http.request(Method::GET, &url).header("CJ-Access-Token", &self.api_key);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_supplier_error("cj", status, &body));
        }

        let stock: CjStockResponse = response
            .json()
            .await
            .map_err(|err| SyncError::Internal(format!("unreadable cj stock response: {err}")))?;
        Ok(stock.data.storage_num)
    }

    async fn place_order(
        &self,
        supplier_sku: &str,
        quantity: i64,
        destination: &Destination,
    ) -> Result<String> {
        let url = format!("{}/shopping/order/createOrder", self.base_url);
        let body = json!({
            "products": [{ "sku": supplier_sku, "quantity": quantity }],
            "shippingCustomerName": destination.name,
            "shippingAddress": destination.address_line,
            "shippingCity": destination.city,
            "shippingZip": destination.postal_code,
            "shippingCountryCode": destination.country_code,
        });
        let request = self
            .http
            .request(Method::POST, &url)
            .header("CJ-Access-Token", &self.api_key)
            .json(&body);

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_supplier_error("cj", status, &body));
        }

        let order: CjOrderResponse = response
            .json()
            .await
            .map_err(|err| SyncError::Internal(format!("unreadable cj order response: {err}")))?;
        Ok(order.data.order_id)
    }
}

#[derive(Debug, Deserialize)]
struct CjStockResponse {
    data: CjStockData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CjStockData {
    storage_num: i64,
}

#[derive(Debug, Deserialize)]
struct CjOrderResponse {
    data: CjOrderData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CjOrderData {
    order_id: String,
}
