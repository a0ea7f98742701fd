//! HTTP transport seam.
//!
//! The orchestrator hands each [`RequestAttempt`] to an [`HttpTransport`] and
//! gets back the raw status, headers, and body. Network failures are reported
//! pre-classified so the retry logic never has to inspect client internals.

pub mod reqwest_client;

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use thiserror::Error;
use url::Url;

use crate::modules::proxy::ProxyEndpoint;

pub use reqwest_client::ReqwestTransport;

/// Merged headers, chosen proxy, and target of one outbound GET.
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    pub url: Url,
    pub headers: HeaderMap,
    pub proxy: Option<ProxyEndpoint>,
}

/// Minimal response representation returned by the transport abstraction.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: Url,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection reset by peer")]
    ConnectionReset,
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("invalid proxy configuration: {0}")]
    Proxy(String),
    #[error("http transport error: {0}")]
    Other(String),
}

/// Contract that abstracts the underlying HTTP client.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: &RequestAttempt) -> Result<TransportResponse, TransportError>;
}
