//! HTTP transport seam.
//!
//! The completion client only needs "send a request, get a status and a
//! byte stream back". Keeping that behind a trait lets tests script exact
//! byte sequences without a network.

use crate::error::CompletionError;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::Client;
use std::time::Duration;

/// Response body as a stream of raw chunks.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, CompletionError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A request as the completion client builds it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Sent as `Authorization: Bearer {token}` when present.
    pub bearer: Option<String>,
    /// JSON body for POST requests.
    pub body: Option<serde_json::Value>,
}

pub struct TransportResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drains the body into a string (lossy UTF-8).
    pub async fn text(self) -> Result<String, CompletionError> {
        let chunks: Vec<Vec<u8>> = self.body.try_collect().await?;
        Ok(String::from_utf8_lossy(&chunks.concat()).into_owned())
    }
}

/// Sends HTTP requests on behalf of the completion client.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends `request` and returns once response headers are available.
    ///
    /// # Returns
    ///
    /// - `Ok(TransportResponse)`: Any HTTP status, including non-2xx
    /// - `Err(CompletionError::Network)`: The request could not be sent
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, CompletionError>;
}

/// Production transport over a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Creates a transport whose connection attempts give up after `timeout`.
    ///
    /// Streaming reads are not bounded; only connecting is.
    pub fn with_connect_timeout(timeout: Duration) -> Result<Self, CompletionError> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, CompletionError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| {
            CompletionError::network(format!("Request to {} failed: {}", request.url, err))
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(CompletionError::from))
            .boxed();

        Ok(TransportResponse { status, body })
    }
}
