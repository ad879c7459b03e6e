//! Bypass statistics
//!
//! A pure sink: nothing here feeds back into decisions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{BypassDecision, BypassEventType, RetryDecision};

/// Point-in-time copy of the bypass counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BypassStatsSnapshot {
    /// Responses classified
    pub responses: u64,
    /// Retries handed to the transaction layer
    pub retries: u64,
    /// Proxy penalties recorded
    pub penalties: u64,
    /// Trusted responses whose via marker was followed by another proxy
    pub via_intermediaries: u64,
    /// Classification of the most recent response
    pub last_event: BypassEventType,
    /// Bypass count per event type (the "no bypass" sentinel is not counted)
    pub events: BTreeMap<String, u64>,
    pub captured_at: DateTime<Utc>,
}

/// Bypass event recorder
#[derive(Debug)]
pub struct BypassStats {
    last_event: Mutex<BypassEventType>,
    events: DashMap<BypassEventType, u64>,
    responses: AtomicU64,
    retries: AtomicU64,
    penalties: AtomicU64,
    via_intermediaries: AtomicU64,
}

impl BypassStats {
    pub fn new() -> Self {
        Self {
            last_event: Mutex::new(BypassEventType::NoBypass),
            events: DashMap::new(),
            responses: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            penalties: AtomicU64::new(0),
            via_intermediaries: AtomicU64::new(0),
        }
    }

    pub fn record_decision(&self, decision: &BypassDecision) {
        *self.last_event.lock() = decision.event;
        self.responses.fetch_add(1, Ordering::Relaxed);
        if decision.event.is_bypass() {
            self.events
                .entry(decision.event)
                .and_modify(|c| *c += 1)
                .or_insert(1);
        }
    }

    pub fn record_retry(&self, retry: &RetryDecision) {
        if retry.retry {
            self.retries.fetch_add(1, Ordering::Relaxed);
        }
        self.penalties
            .fetch_add(retry.penalties_recorded as u64, Ordering::Relaxed);
    }

    pub fn record_via_intermediary(&self) {
        self.via_intermediaries.fetch_add(1, Ordering::Relaxed);
    }

    /// Classification of the most recent response
    pub fn last_bypass_event_type(&self) -> BypassEventType {
        *self.last_event.lock()
    }

    pub fn count(&self, event: BypassEventType) -> u64 {
        self.events.get(&event).map(|v| *v).unwrap_or(0)
    }

    pub fn snapshot(&self) -> BypassStatsSnapshot {
        let events = BypassEventType::ALL
            .iter()
            .filter(|e| e.is_bypass())
            .map(|e| (e.as_str().to_string(), self.count(*e)))
            .collect();

        BypassStatsSnapshot {
            responses: self.responses.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            penalties: self.penalties.load(Ordering::Relaxed),
            via_intermediaries: self.via_intermediaries.load(Ordering::Relaxed),
            last_event: self.last_bypass_event_type(),
            events,
            captured_at: Utc::now(),
        }
    }

    pub fn snapshot_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn reset(&self) {
        *self.last_event.lock() = BypassEventType::NoBypass;
        self.events.clear();
        self.responses.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.penalties.store(0, Ordering::Relaxed);
        self.via_intermediaries.store(0, Ordering::Relaxed);
    }
}

impl Default for BypassStats {
    fn default() -> Self {
        Self::new()
    }
}
