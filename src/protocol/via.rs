//! Via header inspection
//!
//! The compressing proxy appends `1.1 <token>` (or `1.0 <token>`) to `Via`.
//! Other proxies may add their own entries before or after it.

use http::header::VIA;
use http::HeaderMap;

/// Result of looking for the via marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViaMarker {
    /// The marker appears in some `Via` entry
    pub present: bool,
    /// Another proxy sits between the compressing proxy and the client.
    /// Counted in the bypass statistics; never changes a decision.
    pub has_intermediary: bool,
}

/// Look for any of `tokens` as the received-by part of a `Via` entry
pub fn inspect<'a>(headers: &HeaderMap, tokens: impl IntoIterator<Item = &'a str> + Clone) -> ViaMarker {
    let entries: Vec<&str> = headers
        .get_all(VIA)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect();

    let last_match = entries
        .iter()
        .rposition(|entry| tokens.clone().into_iter().any(|token| is_marker(entry, token)));

    match last_match {
        Some(index) => ViaMarker {
            present: true,
            has_intermediary: index + 1 < entries.len(),
        },
        None => ViaMarker::default(),
    }
}

fn is_marker(entry: &str, token: &str) -> bool {
    let Some((protocol, received_by)) = entry.split_once(char::is_whitespace) else {
        return false;
    };
    let version = protocol.strip_prefix("HTTP/").unwrap_or(protocol);
    if version != "1.0" && version != "1.1" {
        return false;
    }
    let received_by = match received_by.find('(') {
        Some(comment) => &received_by[..comment],
        None => received_by,
    };
    received_by.trim() == token
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    const TOKENS: [&str; 2] = ["Chrome-Compression-Proxy", "Chrome Compression Proxy"];

    fn headers(values: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(VIA, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_marker_present() {
        let marker = inspect(&headers(&["1.1 Chrome-Compression-Proxy"]), TOKENS);
        assert!(marker.present);
        assert!(!marker.has_intermediary);

        let marker = inspect(&headers(&["1.0 Chrome-Compression-Proxy (comment)"]), TOKENS);
        assert!(marker.present);

        let marker = inspect(&headers(&["HTTP/1.1 Chrome-Compression-Proxy"]), TOKENS);
        assert!(marker.present);

        let marker = inspect(&headers(&["1.1 Chrome Compression Proxy"]), TOKENS);
        assert!(marker.present);
    }

    #[test]
    fn test_marker_in_chained_entries() {
        let marker = inspect(
            &headers(&["1.1 Chrome-Compression-Proxy, 1.0 some-other-proxy"]),
            TOKENS,
        );
        assert!(marker.present);
        assert!(marker.has_intermediary);

        let marker = inspect(
            &headers(&["1.0 some-other-proxy", "1.1 Chrome-Compression-Proxy"]),
            TOKENS,
        );
        assert!(marker.present);
        assert!(!marker.has_intermediary);
    }

    #[test]
    fn test_marker_absent() {
        assert!(!inspect(&HeaderMap::new(), TOKENS).present);
        assert!(!inspect(&headers(&["1.0 some-other-proxy"]), TOKENS).present);
        assert!(!inspect(&headers(&["2.0 Chrome-Compression-Proxy"]), TOKENS).present);
        assert!(!inspect(&headers(&["Chrome-Compression-Proxy"]), TOKENS).present);
        assert!(!inspect(&headers(&["1.1 Chrome-Compression-Proxy-Fake"]), TOKENS).present);
    }
}
