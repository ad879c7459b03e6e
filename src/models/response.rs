use http::{HeaderMap, HeaderValue, Method, StatusCode};
use thiserror::Error;

/// Transport-level failure reported by the transaction layer
///
/// These are never bypass signals; they are handed back to the caller as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid HTTP response")]
    InvalidResponse,

    #[error("connection reset")]
    ConnectionReset,

    #[error("connection closed before the response completed")]
    ConnectionClosed,

    #[error("{0}")]
    Other(String),
}

/// Snapshot of one response as seen by the bypass engine
#[derive(Debug, Clone)]
pub struct ResponseDescriptor {
    /// Request method the response belongs to
    pub method: Method,
    /// Status code; absent when the transport failed before a status line was read
    pub status: Option<StatusCode>,
    /// Response headers (only `Via` and the proxy-control header are consulted)
    pub headers: HeaderMap,
    /// Whether the response came back through the configured proxy chain
    pub via_proxy: bool,
    /// Transport failure, if any
    pub transport_error: Option<TransportError>,
}

impl ResponseDescriptor {
    /// Response received through the proxy chain
    pub fn new(method: Method, status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            method,
            status: Some(status),
            headers,
            via_proxy: true,
            transport_error: None,
        }
    }

    /// Response received over a direct (non-proxied) connection
    pub fn direct(method: Method, status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            via_proxy: false,
            ..Self::new(method, status, headers)
        }
    }

    /// Transaction that failed at the transport layer while using the proxy
    pub fn failed(method: Method, error: TransportError) -> Self {
        Self {
            method,
            status: None,
            headers: HeaderMap::new(),
            via_proxy: true,
            transport_error: Some(error),
        }
    }

    /// Append a header value, skipping names or values that are not valid HTTP
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            http::HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => {
                tracing::debug!(header = name, "Skipping invalid header");
            }
        }
        self
    }
}
