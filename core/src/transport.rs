//! Network seam between the client and the HTTP stack.
//!
//! `Transport` executes one `HttpRequest`. The production implementation is
//! `ReqwestTransport`; tests plug in scripted transports. Cancellation is
//! driven by dropping the `execute` future, which for reqwest aborts the
//! in-flight exchange.

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Network-level failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport observed that the exchange was aborted.
    #[error("request cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    Network(String),
}

/// Executes HTTP exchanges for a `TypografClient`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `Transport` backed by a shared `reqwest::Client` and its connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(concat!("typograf-core/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Use an already configured client, sharing its pool.
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.http.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body.into_bytes());
        }

        let response = builder.send().await.map_err(network_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(network_error)?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn network_error(error: reqwest::Error) -> TransportError {
    TransportError::Network(error.to_string())
}
