//! # Transport Client
//!
//! CRUD calls against a named resource of the discount REST API.
//!
//! ## Endpoint Convention
//!
//! `{baseUrl}/{token}/{resource}[/{id}]` with JSON request and response
//! bodies. The URL is resolved from a [`ConfigStore`] passed in on every call,
//! so the client itself holds no connection settings.
//!
//! ## Error Translation
//!
//! - Non-2xx status: fixed message per status code ([`ApiError::from_status`])
//! - No response (connect failure, 10 second timeout): [`ApiError::NoResponse`]
//! - Anything else (bad URL, client setup): [`ApiError::RequestSetup`]
//!
//! Every translated error is logged and returned; nothing is swallowed here.
//! Requests are never retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, error};

use crate::config::{ConfigStore, PRIMARY_RESOURCE};
use crate::error::{ApiError, ApiResult};
use crate::models::{ConnectionTest, Discount, DiscountPayload};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote operations the discount store depends on
#[async_trait]
pub trait DiscountApi: Send + Sync {
    /// GET the resource collection. The body is returned as-is; callers
    /// treat anything other than an array as empty.
    async fn fetch_list(
        &self,
        config: &mut ConfigStore,
        resource: &str,
        params: &[(&str, &str)],
    ) -> ApiResult<Value>;

    /// POST a new record, returning the record the server stored
    async fn create(
        &self,
        config: &mut ConfigStore,
        resource: &str,
        payload: &DiscountPayload,
    ) -> ApiResult<Discount>;

    /// PUT to `{endpoint}/{id}`
    async fn update(
        &self,
        config: &mut ConfigStore,
        resource: &str,
        id: &str,
        payload: &DiscountPayload,
    ) -> ApiResult<Discount>;

    /// DELETE `{endpoint}/{id}`
    async fn remove(&self, config: &mut ConfigStore, resource: &str, id: &str) -> ApiResult<()>;

    /// Probe the primary resource through the composed URL, ignoring any
    /// override. Failures are reported in the result, never returned.
    async fn test_connection(&self, config: &mut ConfigStore) -> ConnectionTest;
}

/// reqwest-backed [`DiscountApi`]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    pub fn new() -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    fn item_url(endpoint: &str, id: &str) -> String {
        format!("{}/{}", endpoint, urlencoding::encode(id))
    }

    /// Sends the request and parses the JSON body of a 2xx response.
    /// An empty body parses to `Value::Null`.
    async fn execute(&self, request: RequestBuilder) -> ApiResult<Value> {
        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                error!("Request setup error: {}", e);
            } else {
                error!("No response received: {}", e);
            }
            ApiError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "API error response");
            return Err(ApiError::from_status(status.as_u16(), body));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            error!("Unparseable response body: {}", e);
            ApiError::InvalidResponse(e.to_string())
        })
    }

    fn into_discount(body: Value) -> ApiResult<Discount> {
        serde_json::from_value(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl DiscountApi for ApiClient {
    async fn fetch_list(
        &self,
        config: &mut ConfigStore,
        resource: &str,
        params: &[(&str, &str)],
    ) -> ApiResult<Value> {
        let url = config.resolve_endpoint_url(resource).await?;
        debug!("GET {}", url);

        self.execute(self.client.get(&url).query(params)).await
    }

    async fn create(
        &self,
        config: &mut ConfigStore,
        resource: &str,
        payload: &DiscountPayload,
    ) -> ApiResult<Discount> {
        let url = config.resolve_endpoint_url(resource).await?;
        debug!("POST {}", url);

        let body = self.execute(self.client.post(&url).json(payload)).await?;
        Self::into_discount(body)
    }

    async fn update(
        &self,
        config: &mut ConfigStore,
        resource: &str,
        id: &str,
        payload: &DiscountPayload,
    ) -> ApiResult<Discount> {
        let url = Self::item_url(&config.resolve_endpoint_url(resource).await?, id);
        debug!("PUT {}", url);

        let body = self.execute(self.client.put(&url).json(payload)).await?;
        Self::into_discount(body)
    }

    async fn remove(&self, config: &mut ConfigStore, resource: &str, id: &str) -> ApiResult<()> {
        let url = Self::item_url(&config.resolve_endpoint_url(resource).await?, id);
        debug!("DELETE {}", url);

        self.execute(self.client.delete(&url)).await?;
        Ok(())
    }

    async fn test_connection(&self, config: &mut ConfigStore) -> ConnectionTest {
        let url = match config.composed_url(PRIMARY_RESOURCE).await {
            Ok(url) => url,
            Err(e) => {
                return ConnectionTest {
                    success: false,
                    status: None,
                    data: None,
                    error: None,
                    message: e.to_string(),
                };
            }
        };

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                return ConnectionTest {
                    success: false,
                    status: None,
                    data: None,
                    error: None,
                    message: ApiError::from(e).to_string(),
                };
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text.clone()));

        if (200..300).contains(&status) {
            ConnectionTest {
                success: true,
                status: Some(status),
                data: Some(body),
                error: None,
                message: "Koneksi API berhasil".to_string(),
            }
        } else {
            ConnectionTest {
                success: false,
                status: Some(status),
                data: None,
                error: Some(body),
                message: ApiError::from_status(status, text).to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::config::Defaults;
    use crate::models::DiscountType;
    use crate::storage::MemoryStore;

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Accepts one connection, answers with `response`, and yields the raw request
    async fn serve_once(response: String) -> (SocketAddr, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];

            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);

                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }

            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });

        (addr, handle)
    }

    async fn config_for(base_url: String) -> ConfigStore {
        ConfigStore::new(Arc::new(MemoryStore::new()), Defaults::new(base_url, "tok"))
            .await
            .unwrap()
    }

    fn payload() -> DiscountPayload {
        DiscountPayload {
            name: "Burger Hemat".to_string(),
            kind: DiscountType::Fixed,
            value: 10000.0,
            description: None,
        }
    }

    #[tokio::test]
    async fn fetch_list_sends_query_and_json_headers() {
        let body = r#"[{"_id":"1","name":"Burger Hemat","type":"fixed","value":10000}]"#;
        let (addr, server) = serve_once(http_response("200 OK", body)).await;
        let mut config = config_for(format!("http://{addr}/api")).await;
        let client = ApiClient::new().unwrap();

        let value = client
            .fetch_list(&mut config, "diskon", &[("search", "burger")])
            .await
            .unwrap();

        assert_eq!(value.as_array().map(Vec::len), Some(1));
        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /api/tok/diskon?search=burger http/1.1"));
        assert!(request.contains("accept: application/json"));
    }

    #[tokio::test]
    async fn create_posts_payload_and_parses_record() {
        let body = r#"{"_id":"abc","name":"Burger Hemat","type":"fixed","value":10000}"#;
        let (addr, server) = serve_once(http_response("201 Created", body)).await;
        let mut config = config_for(format!("http://{addr}/api")).await;
        let client = ApiClient::new().unwrap();

        let created = client.create(&mut config, "diskon", &payload()).await.unwrap();

        assert_eq!(created.id, "abc");
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/tok/diskon HTTP/1.1"));
        assert!(request.contains(r#""type":"fixed""#));
    }

    #[tokio::test]
    async fn update_targets_item_url() {
        let body = r#"{"_id":"abc","name":"Burger Hemat","type":"fixed","value":10000}"#;
        let (addr, server) = serve_once(http_response("200 OK", body)).await;
        let mut config = config_for(format!("http://{addr}/api")).await;
        let client = ApiClient::new().unwrap();

        client
            .update(&mut config, "diskon", "abc", &payload())
            .await
            .unwrap();

        assert!(server.await.unwrap().starts_with("PUT /api/tok/diskon/abc HTTP/1.1"));
    }

    #[tokio::test]
    async fn remove_accepts_empty_body() {
        let (addr, server) = serve_once(http_response("204 No Content", "")).await;
        let mut config = config_for(format!("http://{addr}/api")).await;
        let client = ApiClient::new().unwrap();

        client.remove(&mut config, "diskon", "abc").await.unwrap();

        assert!(server.await.unwrap().starts_with("DELETE /api/tok/diskon/abc HTTP/1.1"));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_credential_error() {
        let (addr, _server) = serve_once(http_response("401 Unauthorized", "{}")).await;
        let mut config = config_for(format!("http://{addr}/api")).await;
        let client = ApiClient::new().unwrap();

        let err = client.fetch_list(&mut config, "diskon", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn unknown_status_carries_code_and_body() {
        let (addr, _server) = serve_once(http_response("503 Service Unavailable", "down")).await;
        let mut config = config_for(format!("http://{addr}/api")).await;
        let client = ApiClient::new().unwrap();

        let err = client.fetch_list(&mut config, "diskon", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "Error 503: down");
    }

    #[tokio::test]
    async fn non_json_success_body_is_invalid_response() {
        let (addr, _server) = serve_once(http_response("200 OK", "<html></html>")).await;
        let mut config = config_for(format!("http://{addr}/api")).await;
        let client = ApiClient::new().unwrap();

        let err = client.fetch_list(&mut config, "diskon", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn closed_port_is_no_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = config_for(format!("http://{addr}/api")).await;
        let client = ApiClient::new().unwrap();

        let err = client.fetch_list(&mut config, "diskon", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::NoResponse));
    }

    #[tokio::test]
    async fn malformed_base_url_is_setup_failure() {
        let mut config = config_for("not a url".to_string()).await;
        let client = ApiClient::new().unwrap();

        let err = client.fetch_list(&mut config, "diskon", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::RequestSetup(_)));
    }

    #[tokio::test]
    async fn test_connection_ignores_override() {
        let (addr, server) = serve_once(http_response("200 OK", "[]")).await;
        let mut config = config_for(format!("http://{addr}/api")).await;
        config
            .set_full_url("http://127.0.0.1:1/elsewhere/diskon")
            .await
            .unwrap();
        let client = ApiClient::new().unwrap();

        let result = client.test_connection(&mut config).await;

        assert!(result.success);
        assert_eq!(result.status, Some(200));
        assert!(server.await.unwrap().starts_with("GET /api/"));
    }

    #[tokio::test]
    async fn test_connection_reports_failure_in_band() {
        let (addr, _server) = serve_once(http_response("404 Not Found", r#"{"msg":"nope"}"#)).await;
        let mut config = config_for(format!("http://{addr}/api")).await;
        let client = ApiClient::new().unwrap();

        let result = client.test_connection(&mut config).await;

        assert!(!result.success);
        assert_eq!(result.status, Some(404));
        assert_eq!(result.error.unwrap()["msg"], "nope");
        assert_eq!(result.message, "Endpoint tidak ditemukan.");
    }
}
