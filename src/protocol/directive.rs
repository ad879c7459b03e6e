//! Proxy-control header parsing
//!
//! The header value is a comma-separated list of `bypass=<seconds>`,
//! `block=<seconds>` and `block-once`. Directives are resolved by priority
//! (block, then bypass, then block-once), not by their position in the header.

use std::time::Duration;

use http::header::GetAll;
use http::HeaderValue;

const BLOCK: &str = "block";
const BYPASS: &str = "bypass";
const BLOCK_ONCE: &str = "block-once";

/// Parsed proxy-control directive
///
/// A `None` duration asks the engine for its default bypass duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyDirective {
    #[default]
    None,
    Bypass(Option<Duration>),
    Block(Option<Duration>),
    BlockOnce,
}

impl ProxyDirective {
    /// Parse every value of the proxy-control header
    pub fn from_headers(values: GetAll<'_, HeaderValue>) -> Self {
        let tokens: Vec<&str> = values
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(split_tokens)
            .collect();
        Self::from_tokens(&tokens)
    }

    /// Parse a single header value
    pub fn parse(value: &str) -> Self {
        let tokens: Vec<&str> = split_tokens(value).collect();
        Self::from_tokens(&tokens)
    }

    fn from_tokens(tokens: &[&str]) -> Self {
        if let Some(duration) = find_duration(tokens, BLOCK) {
            return ProxyDirective::Block(duration);
        }
        if let Some(duration) = find_duration(tokens, BYPASS) {
            return ProxyDirective::Bypass(duration);
        }
        if tokens.iter().any(|t| t.eq_ignore_ascii_case(BLOCK_ONCE)) {
            return ProxyDirective::BlockOnce;
        }
        ProxyDirective::None
    }
}

fn split_tokens(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// First `key=<seconds>` token. The outer `Option` is presence, the inner one
/// the duration; zero and unparsable values map to `None`.
fn find_duration(tokens: &[&str], key: &str) -> Option<Option<Duration>> {
    tokens.iter().find_map(|token| {
        let (name, value) = token.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case(key) {
            return None;
        }
        let seconds = value
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|&s| s > 0)
            .map(Duration::from_secs);
        Some(seconds)
    })
}
