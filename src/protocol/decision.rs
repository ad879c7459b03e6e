//! Bypass decision engine
//!
//! Classifies one response into exactly one [`BypassAction`] and one
//! [`BypassEventType`]. Rules are evaluated in a fixed order and the first one
//! that applies wins:
//!
//! 1. direct connection: proxy-control headers are not trusted
//! 2. transport error: surfaced to the caller, never a bypass signal
//! 3. `block=` / `bypass=` directive
//! 4. `block-once` directive
//! 5. 500, 502 or 503 from the proxy
//! 6. 4xx without the via marker
//! 7. 304 Not Modified
//! 8. any other response without the via marker (subject to relaxation)
//! 9. otherwise the response is trusted

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderName, StatusCode};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::BypassConfig;
use crate::error::{Result, VeerError};
use crate::models::{BypassAction, BypassDecision, BypassEventType, ResponseDescriptor};

use super::directive::ProxyDirective;
use super::relaxation::RelaxationPolicy;
use super::via;

/// Source of the default bypass duration used when a directive or rule does
/// not specify one
pub trait DelaySource: Send + Sync {
    fn default_delay(&self) -> Duration;
}

/// Uniformly random whole-second duration in an inclusive range
#[derive(Debug)]
pub struct RandomDelay {
    min_secs: u64,
    max_secs: u64,
    rng: Mutex<StdRng>,
}

impl RandomDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self::with_rng(min, max, StdRng::from_entropy())
    }

    /// Reproducible sequence of durations
    pub fn seeded(min: Duration, max: Duration, seed: u64) -> Self {
        Self::with_rng(min, max, StdRng::seed_from_u64(seed))
    }

    fn with_rng(min: Duration, max: Duration, rng: StdRng) -> Self {
        let (a, b) = (min.as_secs(), max.as_secs());
        Self {
            min_secs: a.min(b),
            max_secs: a.max(b),
            rng: Mutex::new(rng),
        }
    }
}

impl DelaySource for RandomDelay {
    fn default_delay(&self) -> Duration {
        let secs = self.rng.lock().gen_range(self.min_secs..=self.max_secs);
        Duration::from_secs(secs)
    }
}

/// Always the same duration
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl DelaySource for FixedDelay {
    fn default_delay(&self) -> Duration {
        self.0
    }
}

/// Decides whether a proxied response should cause a bypass
pub struct BypassDecider {
    control_header: HeaderName,
    via_tokens: Vec<String>,
    missing_via_4xx_bypass: Duration,
    relaxation: Arc<RelaxationPolicy>,
    delays: Arc<dyn DelaySource>,
}

impl BypassDecider {
    pub fn new(
        config: &BypassConfig,
        relaxation: Arc<RelaxationPolicy>,
        delays: Arc<dyn DelaySource>,
    ) -> Result<Self> {
        config.validate()?;
        let control_header = HeaderName::from_bytes(config.control_header.as_bytes())
            .map_err(|e| VeerError::InvalidConfig(format!("invalid control header: {}", e)))?;

        Ok(Self {
            control_header,
            via_tokens: config.accepted_via_tokens().map(str::to_string).collect(),
            missing_via_4xx_bypass: config.missing_via_4xx_bypass,
            relaxation,
            delays,
        })
    }

    /// Decider with its own relaxation state and a random delay source
    /// (seeded when the configuration carries a seed)
    pub fn from_config(config: &BypassConfig) -> Result<Self> {
        let delays: Arc<dyn DelaySource> = match config.seed {
            Some(seed) => Arc::new(RandomDelay::seeded(
                config.default_bypass_min,
                config.default_bypass_max,
                seed,
            )),
            None => Arc::new(RandomDelay::new(
                config.default_bypass_min,
                config.default_bypass_max,
            )),
        };
        let relaxation = Arc::new(RelaxationPolicy::new(config.relaxed_missing_via));
        Self::new(config, relaxation, delays)
    }

    pub fn relaxation(&self) -> &Arc<RelaxationPolicy> {
        &self.relaxation
    }

    /// Classify a response
    pub fn decide(&self, resp: &ResponseDescriptor) -> BypassDecision {
        self.decide_with_marker(resp).0
    }

    /// Classify a response, also returning what the `Via` header showed.
    ///
    /// The marker is the default (absent) for direct or failed transactions.
    pub fn decide_with_marker(
        &self,
        resp: &ResponseDescriptor,
    ) -> (BypassDecision, via::ViaMarker) {
        if !resp.via_proxy {
            if resp.headers.contains_key(&self.control_header) {
                warn!(
                    header = %self.control_header,
                    "Ignoring proxy-control header received over a direct connection"
                );
            }
            return (BypassDecision::no_bypass(), via::ViaMarker::default());
        }

        if let Some(err) = &resp.transport_error {
            debug!(error = %err, "Transport error is surfaced unchanged, not a bypass signal");
            return (BypassDecision::no_bypass(), via::ViaMarker::default());
        }

        let Some(status) = resp.status else {
            return (BypassDecision::no_bypass(), via::ViaMarker::default());
        };

        let marker = via::inspect(&resp.headers, self.via_tokens.iter().map(String::as_str));
        if marker.present {
            self.relaxation.observe_via_marker();
        }

        let decision = self.classify(status, marker, &resp.headers);
        debug!(
            status = status.as_u16(),
            via_marker = marker.present,
            has_intermediary = marker.has_intermediary,
            action = ?decision.action,
            event = %decision.event,
            "Bypass decision"
        );
        (decision, marker)
    }

    fn classify(
        &self,
        status: StatusCode,
        marker: via::ViaMarker,
        headers: &http::HeaderMap,
    ) -> BypassDecision {
        match ProxyDirective::from_headers(headers.get_all(&self.control_header)) {
            ProxyDirective::Block(duration) => {
                let duration = self.resolve(duration);
                return BypassDecision::new(
                    BypassAction::BypassProxyChain(duration),
                    BypassEventType::for_duration(duration),
                );
            }
            ProxyDirective::Bypass(duration) => {
                let duration = self.resolve(duration);
                return BypassDecision::new(
                    BypassAction::BypassCurrentProxy(duration),
                    BypassEventType::for_duration(duration),
                );
            }
            ProxyDirective::BlockOnce => {
                return BypassDecision::new(
                    BypassAction::BypassCurrentRequestOnly,
                    BypassEventType::Current,
                );
            }
            ProxyDirective::None => {}
        }

        let status_event = match status {
            StatusCode::INTERNAL_SERVER_ERROR => Some(BypassEventType::Status500),
            StatusCode::BAD_GATEWAY => Some(BypassEventType::Status502),
            StatusCode::SERVICE_UNAVAILABLE => Some(BypassEventType::Status503),
            _ => None,
        };
        if let Some(event) = status_event {
            return BypassDecision::new(
                BypassAction::BypassCurrentProxy(self.delays.default_delay()),
                event,
            );
        }

        if marker.present {
            return BypassDecision::no_bypass();
        }

        if status.is_client_error() {
            return BypassDecision::new(
                BypassAction::BypassCurrentProxy(self.missing_via_4xx_bypass),
                BypassEventType::MissingViaHeader4xx,
            );
        }

        // A revalidated cache entry may legitimately come back without Via.
        if status == StatusCode::NOT_MODIFIED {
            return BypassDecision::no_bypass();
        }

        if self.relaxation.allows_missing_via() {
            debug!("Accepting response without via marker, marker already seen on this network");
            return BypassDecision::no_bypass();
        }

        BypassDecision::new(
            BypassAction::BypassCurrentProxy(self.delays.default_delay()),
            BypassEventType::MissingViaHeaderOther,
        )
    }

    fn resolve(&self, duration: Option<Duration>) -> Duration {
        duration.unwrap_or_else(|| self.delays.default_delay())
    }
}
