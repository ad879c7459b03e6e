use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, VeerError};

/// Proxy scheme type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    Http,
    Https,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "http" => Some(ProxyScheme::Http),
            "https" => Some(ProxyScheme::Https),
            _ => None,
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ProxyScheme::Http => 80,
            ProxyScheme::Https => 443,
        }
    }
}

impl std::fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A compressing proxy the client may route through
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyServer {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
}

impl ProxyServer {
    pub fn new(scheme: ProxyScheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// Parse a proxy URI such as `https://proxy.example.com:443`.
    ///
    /// A bare `host:port` is read as an HTTP proxy.
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(VeerError::InvalidProxyAddress("empty proxy URI".into()));
        }

        let url = if uri.contains("://") {
            Url::parse(uri)?
        } else {
            Url::parse(&format!("http://{}", uri))?
        };

        let scheme = ProxyScheme::from_str(url.scheme())
            .ok_or_else(|| VeerError::UnsupportedScheme(url.scheme().to_string()))?;

        if !(url.path().is_empty() || url.path() == "/")
            || url.query().is_some()
            || url.fragment().is_some()
        {
            return Err(VeerError::InvalidProxyAddress(format!(
                "proxy URI must not include a path, query or fragment: {}",
                uri
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| VeerError::InvalidProxyAddress(format!("missing host: {}", uri)))?;
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        Ok(Self::new(scheme, host, port))
    }

    /// Key used by the retry-penalty table
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for ProxyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Ordered proxy candidates for one request, with the proxy that served the
/// current response
///
/// A direct connection is always the implicit last resort after every proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyChain {
    servers: Vec<ProxyServer>,
    current: usize,
}

impl ProxyChain {
    /// Chain whose first proxy served the response
    pub fn new(servers: Vec<ProxyServer>) -> Self {
        Self {
            servers,
            current: 0,
        }
    }

    /// Parse a comma-separated list of proxy URIs
    pub fn parse(list: &str) -> Result<Self> {
        let servers = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ProxyServer::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(servers))
    }

    /// Mark which proxy of the chain served the response.
    ///
    /// Out-of-range indices are clamped to the last proxy.
    pub fn with_current(mut self, index: usize) -> Self {
        self.current = index.min(self.servers.len().saturating_sub(1));
        self
    }

    pub fn servers(&self) -> &[ProxyServer] {
        &self.servers
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Proxy that served the current response
    pub fn current(&self) -> Option<&ProxyServer> {
        self.servers.get(self.current)
    }

    /// Next candidate after the current proxy, if any
    pub fn next_after_current(&self) -> Option<&ProxyServer> {
        self.servers.get(self.current + 1)
    }
}
