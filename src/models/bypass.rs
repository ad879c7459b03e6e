use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::proxy::ProxyServer;

/// Longest directive duration still reported as a short bypass
pub const SHORT_BYPASS_MAX: Duration = Duration::from_secs(59);
/// Longest directive duration still reported as a medium bypass
pub const MEDIUM_BYPASS_MAX: Duration = Duration::from_secs(5 * 60);

/// What to do about the proxy that produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "duration")]
pub enum BypassAction {
    /// Deliver the response as-is
    NoAction,
    /// Avoid the proxy that served the response for the given duration
    BypassCurrentProxy(Duration),
    /// Avoid every proxy of the chain for the given duration
    BypassProxyChain(Duration),
    /// Retry this request without proxies, recording no penalty
    BypassCurrentRequestOnly,
}

impl BypassAction {
    pub fn is_bypass(&self) -> bool {
        !matches!(self, BypassAction::NoAction)
    }

    /// Penalty duration to record, if the action records one
    pub fn penalty(&self) -> Option<Duration> {
        match self {
            BypassAction::BypassCurrentProxy(d) | BypassAction::BypassProxyChain(d) => Some(*d),
            BypassAction::NoAction | BypassAction::BypassCurrentRequestOnly => None,
        }
    }
}

/// Telemetry classification of a bypass decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassEventType {
    /// block-once: only the current request was bypassed
    Current,
    /// Directive bypass of at most 59 seconds
    Short,
    /// Directive bypass of at most five minutes
    Medium,
    /// Directive bypass longer than five minutes
    Long,
    /// 4xx response without the via marker
    #[serde(rename = "missing_via_header_4xx")]
    MissingViaHeader4xx,
    /// Non-4xx response without the via marker
    MissingViaHeaderOther,
    /// 500 Internal Server Error from the proxy
    #[serde(rename = "status_500")]
    Status500,
    /// 502 Bad Gateway from the proxy
    #[serde(rename = "status_502")]
    Status502,
    /// 503 Service Unavailable from the proxy
    #[serde(rename = "status_503")]
    Status503,
    /// No bypass happened
    NoBypass,
}

impl BypassEventType {
    /// Every event type, sentinel last
    pub const ALL: [BypassEventType; 10] = [
        BypassEventType::Current,
        BypassEventType::Short,
        BypassEventType::Medium,
        BypassEventType::Long,
        BypassEventType::MissingViaHeader4xx,
        BypassEventType::MissingViaHeaderOther,
        BypassEventType::Status500,
        BypassEventType::Status502,
        BypassEventType::Status503,
        BypassEventType::NoBypass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
            Self::MissingViaHeader4xx => "missing_via_header_4xx",
            Self::MissingViaHeaderOther => "missing_via_header_other",
            Self::Status500 => "status_500",
            Self::Status502 => "status_502",
            Self::Status503 => "status_503",
            Self::NoBypass => "no_bypass",
        }
    }

    /// Bucket a directive duration
    pub fn for_duration(duration: Duration) -> Self {
        if duration <= SHORT_BYPASS_MAX {
            Self::Short
        } else if duration <= MEDIUM_BYPASS_MAX {
            Self::Medium
        } else {
            Self::Long
        }
    }

    pub fn is_bypass(&self) -> bool {
        !matches!(self, Self::NoBypass)
    }
}

impl std::fmt::Display for BypassEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The action and its telemetry tag, produced exactly once per response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassDecision {
    pub action: BypassAction,
    pub event: BypassEventType,
}

impl BypassDecision {
    pub fn new(action: BypassAction, event: BypassEventType) -> Self {
        Self { action, event }
    }

    /// Deliver the response, nothing to record
    pub fn no_bypass() -> Self {
        Self::new(BypassAction::NoAction, BypassEventType::NoBypass)
    }
}

/// Where a retried request should be sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "proxy")]
pub enum RetryTarget {
    Proxy(ProxyServer),
    Direct,
}

/// Outcome handed back to the transaction layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryDecision {
    /// Whether the transaction layer should reissue the request
    pub retry: bool,
    /// Target for the retry; `None` when the response is delivered
    pub next_target: Option<RetryTarget>,
    /// Number of proxies a penalty was recorded against
    pub penalties_recorded: usize,
}

impl RetryDecision {
    /// Complete the request with the response already received
    pub fn deliver(penalties_recorded: usize) -> Self {
        Self {
            retry: false,
            next_target: None,
            penalties_recorded,
        }
    }

    pub fn retry(target: RetryTarget, penalties_recorded: usize) -> Self {
        Self {
            retry: true,
            next_target: Some(target),
            penalties_recorded,
        }
    }
}
