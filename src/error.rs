use thiserror::Error;

/// Unified error type for the Veer bypass engine
///
/// The decision path never produces these; they surface from configuration
/// loading, proxy address parsing and the proxy configuration collaborator.
#[derive(Error, Debug)]
pub enum VeerError {
    // Proxy errors
    #[error("No proxies available")]
    NoProxiesAvailable,

    #[error("Invalid proxy address: {0}")]
    InvalidProxyAddress(String),

    #[error("Unsupported proxy scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Failed to mark proxy {proxy} as bad: {reason}")]
    MarkProxyFailed { proxy: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Logging setup
    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    // Serialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Veer operations
pub type Result<T> = std::result::Result<T, VeerError>;

impl VeerError {
    /// Whether the error comes from the proxy configuration collaborator
    ///
    /// Collaborator failures are never fatal to a request: the coordinator
    /// degrades to a direct attempt or delivers the original response.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            VeerError::NoProxiesAvailable | VeerError::MarkProxyFailed { .. }
        )
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for VeerError {
    fn from(err: url::ParseError) -> Self {
        VeerError::InvalidProxyAddress(err.to_string())
    }
}
