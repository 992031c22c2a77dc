//! Metaform Transport - "send request, get JSON"
//!
//! The engine talks to the remote API only through the [`Transport`] trait.
//! Retry and caching policy belong to implementations; the engine itself
//! never times out or retries on its own.
//!
//! - [`ApiRequest`]: method, path, query and JSON body
//! - [`EnvelopeShape`]: tolerant extraction of list responses
//! - [`HttpTransport`]: reqwest implementation with a request timeout

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod envelope;
pub mod error;
pub mod http;
pub mod request;

pub use envelope::{extract_record, EnvelopeShape};
pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use request::{ApiRequest, Method};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Generic JSON API client
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the decoded response body
    ///
    /// Empty success bodies decode to `Value::Null`.
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
        (**self).send(request).await
    }
}

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for transport users
    pub use crate::{ApiRequest, EnvelopeShape, HttpTransport, Method, Transport, TransportError};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
