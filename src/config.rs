use crate::error::{Result, VeerError};
use std::env;
use std::time::Duration;

/// Header carrying bypass directives from the compressing proxy.
pub const DEFAULT_CONTROL_HEADER: &str = "chrome-proxy";
/// Product token the compressing proxy adds to the `Via` header.
pub const DEFAULT_VIA_TOKEN: &str = "Chrome-Compression-Proxy";
/// Token used by older proxy releases.
pub const DEFAULT_DEPRECATED_VIA_TOKEN: &str = "Chrome Compression Proxy";

/// Engine configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Bypass decision configuration
    pub bypass: BypassConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassConfig {
    /// Name of the proxy-control response header (matched case-insensitively)
    pub control_header: String,
    /// Via product token identifying the compressing proxy
    pub via_token: String,
    /// Older via tokens still accepted as a valid marker
    pub deprecated_via_tokens: Vec<String>,
    /// Accept responses missing the via marker once one has been seen since
    /// the last network change
    pub relaxed_missing_via: bool,
    /// Lower bound of the randomized default bypass duration
    pub default_bypass_min: Duration,
    /// Upper bound of the randomized default bypass duration
    pub default_bypass_max: Duration,
    /// Bypass duration for 4xx responses missing the via marker
    pub missing_via_4xx_bypass: Duration,
    /// Optional seed for the default duration source
    pub seed: Option<u64>,
}

impl Default for BypassConfig {
    fn default() -> Self {
        Self {
            control_header: DEFAULT_CONTROL_HEADER.to_string(),
            via_token: DEFAULT_VIA_TOKEN.to_string(),
            deprecated_via_tokens: vec![DEFAULT_DEPRECATED_VIA_TOKEN.to_string()],
            relaxed_missing_via: false,
            default_bypass_min: Duration::from_secs(60),
            default_bypass_max: Duration::from_secs(5 * 60),
            missing_via_4xx_bypass: Duration::from_secs(1),
            seed: None,
        }
    }
}

impl BypassConfig {
    /// Check semantic constraints on the loaded values
    pub fn validate(&self) -> Result<()> {
        if self.control_header.trim().is_empty() {
            return Err(VeerError::InvalidConfig(
                "VEER_CONTROL_HEADER must not be empty".into(),
            ));
        }
        if http::HeaderName::from_bytes(self.control_header.as_bytes()).is_err() {
            return Err(VeerError::InvalidConfig(format!(
                "VEER_CONTROL_HEADER is not a valid header name: {}",
                self.control_header
            )));
        }
        if self.via_token.trim().is_empty() {
            return Err(VeerError::InvalidConfig(
                "VEER_VIA_TOKEN must not be empty".into(),
            ));
        }
        if self.default_bypass_min.is_zero() {
            return Err(VeerError::InvalidConfig(
                "VEER_DEFAULT_BYPASS_MIN_SECS must be greater than zero".into(),
            ));
        }
        if self.default_bypass_min > self.default_bypass_max {
            return Err(VeerError::InvalidConfig(
                "VEER_DEFAULT_BYPASS_MIN_SECS must not exceed VEER_DEFAULT_BYPASS_MAX_SECS".into(),
            ));
        }
        if self.missing_via_4xx_bypass.is_zero() {
            return Err(VeerError::InvalidConfig(
                "VEER_MISSING_VIA_4XX_BYPASS_SECS must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// All via tokens accepted as a marker, primary first
    pub fn accepted_via_tokens(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.via_token.as_str())
            .chain(self.deprecated_via_tokens.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let bypass = BypassConfig {
            control_header: get_env_or("VEER_CONTROL_HEADER", DEFAULT_CONTROL_HEADER)
                .trim()
                .to_lowercase(),
            via_token: get_env_or("VEER_VIA_TOKEN", DEFAULT_VIA_TOKEN)
                .trim()
                .to_string(),
            deprecated_via_tokens: get_env_or(
                "VEER_DEPRECATED_VIA_TOKENS",
                DEFAULT_DEPRECATED_VIA_TOKEN,
            )
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
            relaxed_missing_via: get_env_or("VEER_RELAXED_MISSING_VIA", "false")
                .parse()
                .map_err(|_| {
                    VeerError::InvalidConfig("VEER_RELAXED_MISSING_VIA must be true or false".into())
                })?,
            default_bypass_min: parse_secs("VEER_DEFAULT_BYPASS_MIN_SECS", "60")?,
            default_bypass_max: parse_secs("VEER_DEFAULT_BYPASS_MAX_SECS", "300")?,
            missing_via_4xx_bypass: parse_secs("VEER_MISSING_VIA_4XX_BYPASS_SECS", "1")?,
            seed: parse_seed()?,
        };
        bypass.validate()?;

        Ok(Config {
            bypass,
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "json"),
            },
        })
    }
}

fn parse_secs(key: &str, default: &str) -> Result<Duration> {
    get_env_or(key, default)
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| VeerError::InvalidConfig(format!("{} must be a whole number of seconds", key)))
}

fn parse_seed() -> Result<Option<u64>> {
    let raw = env::var("VEER_BYPASS_SEED").unwrap_or_default();
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| VeerError::InvalidConfig("VEER_BYPASS_SEED must be an unsigned integer".into()))
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
