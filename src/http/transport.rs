//! The network seam: one attempt in, one response or failure out.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::Duration;

use super::request::{Method, Response};

/// Fully resolved request for a single attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Failure to obtain any HTTP response.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection refused, DNS resolution failure, TLS handshake failure.
    #[error("connection failed: {0}")]
    Connect(String),
    /// No response within the per-attempt timeout.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Connection broken mid-request or body could not be read.
    #[error("network error: {0}")]
    Network(String),
    /// The request itself is malformed; retrying cannot help.
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::Invalid(_))
    }

    /// Classifies a reqwest failure, keeping the whole cause chain in the message.
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        let message = describe(error);
        if error.is_builder() {
            TransportError::Invalid(message)
        } else if error.is_timeout() {
            TransportError::Timeout(message)
        } else if error.is_connect() {
            TransportError::Connect(message)
        } else {
            TransportError::Network(message)
        }
    }
}

fn describe(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs exactly one network call.
    async fn send(&self, request: &PreparedRequest) -> Result<Response, TransportError>;
}

/// Transport backed by a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: &PreparedRequest) -> Result<Response, TransportError> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .timeout(request.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                Some((name.as_str().to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        Ok(headers
            .into_iter()
            .fold(Response::new(status, body), |response, (name, value)| {
                response.with_header(&name, value)
            }))
    }
}
