//! Reqwest-based implementation of the `HttpTransport` trait.
//!
//! Keeps one `reqwest::Client` per proxy endpoint since reqwest binds the
//! proxy at client construction time.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;

use super::{HttpTransport, RequestAttempt, TransportError, TransportResponse};
use crate::modules::proxy::ProxyEndpoint;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reqwest-backed transport with a client pool keyed by proxy endpoint.
pub struct ReqwestTransport {
    timeout: Duration,
    clients: Mutex<HashMap<Option<ProxyEndpoint>, Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self, proxy: Option<&ProxyEndpoint>) -> Result<Client, TransportError> {
        let mut guard = self.clients.lock().await;
        let key = proxy.cloned();
        if let Some(client) = guard.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder().timeout(self.timeout);
        if let Some(endpoint) = proxy {
            let mut upstream = reqwest::Proxy::all(endpoint.endpoint())
                .map_err(|err| TransportError::Proxy(err.to_string()))?;
            if let Some(ref creds) = endpoint.credentials {
                upstream = upstream.basic_auth(&creds.username, &creds.password);
            }
            builder = builder.proxy(upstream);
        } else {
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|err| TransportError::Other(err.to_string()))?;
        guard.insert(key, client.clone());
        Ok(client)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &RequestAttempt) -> Result<TransportResponse, TransportError> {
        let client = self.client(request.proxy.as_ref()).await?;
        let response = client
            .get(request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await.map_err(classify)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
            url,
        })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if is_connection_reset(&err) {
        TransportError::ConnectionReset
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

fn is_connection_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(error) = current {
        if let Some(io_err) = error.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            )
        {
            return true;
        }
        let message = error.to_string();
        if message.contains("connection reset")
            || message.contains("connection closed before message completed")
        {
            return true;
        }
        current = error.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("request failed")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn detects_reset_in_source_chain() {
        let reset = Wrapper(io::Error::new(io::ErrorKind::ConnectionReset, "peer"));
        assert!(is_connection_reset(&reset));

        let refused = Wrapper(io::Error::new(io::ErrorKind::ConnectionRefused, "nope"));
        assert!(!is_connection_reset(&refused));
    }

    #[tokio::test]
    async fn pools_clients_per_proxy() {
        let transport = ReqwestTransport::new();
        let proxy = ProxyEndpoint::parse("http://127.0.0.1:3128").unwrap();
        transport.client(None).await.unwrap();
        transport.client(Some(&proxy)).await.unwrap();
        transport.client(Some(&proxy)).await.unwrap();
        assert_eq!(transport.clients.lock().await.len(), 2);
    }
}
