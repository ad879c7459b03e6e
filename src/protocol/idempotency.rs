//! Request idempotency
//!
//! Only requests that are safe to replay are retried after a bypass.

use http::Method;

const IDEMPOTENT_METHODS: [Method; 6] = [
    Method::GET,
    Method::HEAD,
    Method::OPTIONS,
    Method::PUT,
    Method::DELETE,
    Method::TRACE,
];

/// Whether a request with this method may be transparently retried.
///
/// Anything not known to be idempotent (POST, CONNECT, PATCH, extension
/// methods) is treated as unsafe.
pub fn is_idempotent(method: &Method) -> bool {
    IDEMPOTENT_METHODS.contains(method)
}

/// Same as [`is_idempotent`] for a raw method name. Method names are
/// case-sensitive, so `get` is an unknown method.
pub fn is_idempotent_name(method: &str) -> bool {
    Method::from_bytes(method.as_bytes())
        .map(|m| is_idempotent(&m))
        .unwrap_or(false)
}
