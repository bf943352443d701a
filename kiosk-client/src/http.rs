//! HTTP client for the order endpoints

use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use shared::ApiResponse;
use shared::order::{OrderDto, OrderItemsRequest};

use crate::{ClientConfig, ClientError, ClientResult};

/// HTTP client for making requests to the kiosk server
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: ClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.get(self.config.url(path)).send().await?;
        Self::handle_response(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self
            .client
            .post(self.config.url(path))
            .json(body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Make a POST request without body
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.post(self.config.url(path)).send().await?;
        Self::handle_response(response).await
    }

    /// Make a PUT request with JSON body
    pub async fn put<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self
            .client
            .put(self.config.url(path))
            .json(body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Handle the HTTP response
    ///
    /// Error bodies carry an `ApiResponse` envelope; its code decides the
    /// `ClientError` variant. Bodies without one fall back to the status.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            if let Some(err) = serde_json::from_str::<ApiResponse<serde_json::Value>>(&text)
                .ok()
                .and_then(ApiResponse::into_error)
            {
                return Err(err.into());
            }
            return match status {
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(text)),
                StatusCode::CONFLICT => Err(ClientError::Conflict(text)),
                s if s.is_client_error() => Err(ClientError::Validation(text)),
                _ => Err(ClientError::Internal(text)),
            };
        }

        response.json().await.map_err(Into::into)
    }

    // ========== Orders API ==========

    /// Orders of one business day, newest first (server's today when `None`)
    pub async fn list_orders(&self, date: Option<NaiveDate>) -> ClientResult<Vec<OrderDto>> {
        match date {
            Some(date) => self.get(&format!("/api/orders?date={date}")).await,
            None => self.get("/api/orders").await,
        }
    }

    pub async fn get_order(&self, id: i64) -> ClientResult<OrderDto> {
        self.get(&format!("/api/orders/{id}")).await
    }

    /// Submit a new order; the response carries the generated order number
    pub async fn create_order(&self, request: &OrderItemsRequest) -> ClientResult<OrderDto> {
        self.post("/api/orders", request).await
    }

    /// Replace the items of an unfulfilled order
    pub async fn replace_items(
        &self,
        id: i64,
        request: &OrderItemsRequest,
    ) -> ClientResult<OrderDto> {
        self.put(&format!("/api/orders/{id}/items"), request).await
    }

    /// Mark an order fulfilled (idempotent)
    pub async fn fulfill_order(&self, id: i64) -> ClientResult<OrderDto> {
        self.post_empty(&format!("/api/orders/{id}/fulfill")).await
    }
}
