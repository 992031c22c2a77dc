//! reqwest-backed transport

use crate::error::TransportError;
use crate::request::{ApiRequest, Method};
use crate::Transport;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// JSON-over-HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    /// Default request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Transport for an API base URL with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    /// Transport with an explicit request timeout
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("metaform/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without trailing slash
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        debug!(request = %request, "sending request");
        let mut builder = self.http.request(method, self.url(&request.path));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let res = builder.send().await.map_err(map_reqwest_error)?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(map_reqwest_error)?;
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => value,
                Err(_) if !status.is_success() => {
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                Err(e) => return Err(TransportError::Decode(e.to_string())),
            }
        };

        if status.is_success() {
            Ok(body)
        } else {
            let err = TransportError::from_body(status.as_u16(), &body);
            warn!(request = %request, error = %err, "request failed");
            Err(err)
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Network("request timed out".to_string())
    } else if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joining() {
        let transport = HttpTransport::new("http://localhost:8080/api/").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8080/api");
        assert_eq!(transport.url("/banks"), "http://localhost:8080/api/banks");
        assert_eq!(transport.url("banks/1"), "http://localhost:8080/api/banks/1");
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let transport =
            HttpTransport::with_timeout("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = transport.send(ApiRequest::get("/banks")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, TransportError::Network(_)));
    }
}
