//! HTTP transport to push services.
//!
//! [`HttpClient`] is the seam the dispatcher sends through, so tests can
//! substitute a fake push service. [`ReqwestHttpClient`] is the production
//! implementation; reuse one instance across dispatches for connection
//! pooling.

use async_trait::async_trait;

use super::push::PushRequest;
use super::WebPushError;

/// Status and body text of a push service response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, kept for logging rejected requests.
    pub body: String,
}

/// Sends built push requests.
#[async_trait]
pub trait HttpClient: Send + Sync + std::fmt::Debug {
    /// POST `request` to its endpoint.
    ///
    /// # Errors
    ///
    /// Returns `WebPushError::Delivery` when no response was received
    /// (DNS, TLS, connection reset). Any HTTP status, including errors, is
    /// a successful return.
    async fn post(&self, request: &PushRequest) -> Result<HttpResponse, WebPushError>;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Build a client with this crate's user agent.
    pub fn new() -> Result<Self, WebPushError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("clinic-push/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WebPushError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post(&self, request: &PushRequest) -> Result<HttpResponse, WebPushError> {
        let mut builder = self.client.post(&request.endpoint);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| WebPushError::Delivery(format!("push request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(HttpResponse { status, body })
    }
}
