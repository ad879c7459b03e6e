//! Proxy bypass protocol
//!
//! This module decides, for every response received over a compressing
//! proxy, whether the proxy should be avoided and whether the request should
//! be retried:
//! - Proxy-control directive and Via marker parsing
//! - Bypass decisions with network-change relaxation
//! - Penalty recording and retry decisions
//! - Bypass statistics
//!
//! ```text
//! transaction layer
//!     → decision.rs (directive.rs, via.rs, relaxation.rs)
//!     → coordinator.rs (idempotency.rs, ProxyConfigurator)
//!     → transaction layer retries or completes
//! decision.rs + coordinator.rs → stats.rs
//! ```

pub mod coordinator;
pub mod decision;
pub mod directive;
pub mod idempotency;
pub mod relaxation;
pub mod retry_table;
pub mod stats;
pub mod via;

pub use coordinator::{ProxyConfigurator, RetryCoordinator};
pub use decision::{BypassDecider, DelaySource, FixedDelay, RandomDelay};
pub use directive::ProxyDirective;
pub use idempotency::{is_idempotent, is_idempotent_name};
pub use relaxation::{NetworkChangeNotifier, RelaxationPolicy, RelaxationState};
pub use retry_table::{ProxyRetryTable, RetryInfoEntry};
pub use stats::{BypassStats, BypassStatsSnapshot};

use std::sync::Arc;

use http::Method;
use serde::Serialize;
use tracing::instrument;

use crate::config::BypassConfig;
use crate::error::Result;
use crate::models::{
    BypassAction, BypassDecision, BypassEventType, ProxyChain, ResponseDescriptor, RetryDecision,
};

/// Decision and retry instructions for one response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BypassOutcome {
    pub decision: BypassDecision,
    pub retry: RetryDecision,
}

/// Entry point used by the transaction layer
pub struct BypassProtocol {
    decider: BypassDecider,
    coordinator: RetryCoordinator,
    stats: Arc<BypassStats>,
}

impl BypassProtocol {
    pub fn new(decider: BypassDecider, coordinator: RetryCoordinator, stats: Arc<BypassStats>) -> Self {
        Self {
            decider,
            coordinator,
            stats,
        }
    }

    /// Build a protocol reporting penalties to `proxies`
    pub fn from_config(config: &BypassConfig, proxies: Arc<dyn ProxyConfigurator>) -> Result<Self> {
        Ok(Self::new(
            BypassDecider::from_config(config)?,
            RetryCoordinator::new(proxies),
            Arc::new(BypassStats::new()),
        ))
    }

    /// Classify a response and apply the resulting action
    #[instrument(skip_all, fields(method = %resp.method, status = ?resp.status.map(|s| s.as_u16())))]
    pub fn on_response(&self, resp: &ResponseDescriptor, chain: &ProxyChain) -> BypassOutcome {
        let decision = self.decide(resp);
        let retry = self.apply(decision.action, &resp.method, chain);
        BypassOutcome { decision, retry }
    }

    /// Classify a response, recording the event type
    pub fn decide(&self, resp: &ResponseDescriptor) -> BypassDecision {
        let (decision, marker) = self.decider.decide_with_marker(resp);
        self.stats.record_decision(&decision);
        if marker.has_intermediary {
            self.stats.record_via_intermediary();
        }
        decision
    }

    /// Apply an action for a request sent through `chain`
    pub fn apply(&self, action: BypassAction, method: &Method, chain: &ProxyChain) -> RetryDecision {
        let retry = self.coordinator.apply(action, method, chain);
        self.stats.record_retry(&retry);
        retry
    }

    pub fn on_network_change(&self) {
        self.decider.relaxation().on_network_change();
    }

    pub fn last_bypass_event_type(&self) -> BypassEventType {
        self.stats.last_bypass_event_type()
    }

    pub fn stats(&self) -> &Arc<BypassStats> {
        &self.stats
    }

    pub fn relaxation(&self) -> &Arc<RelaxationPolicy> {
        self.decider.relaxation()
    }
}
