//! Network-change aware relaxation of the missing-via rule
//!
//! Once a response carrying the via marker has been seen on the current
//! network, later responses missing it are more likely stripped by something
//! on the origin path than served by a foreign proxy. In relaxed mode those
//! responses are accepted until the network changes again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

/// Whether the via marker has been confirmed on the current network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelaxationState {
    Unconfirmed,
    Confirmed,
}

/// Relaxation policy state, shared by every proxy client of a network stack
#[derive(Debug)]
pub struct RelaxationPolicy {
    relaxed: bool,
    via_seen: AtomicBool,
    network_changes: AtomicU64,
}

impl RelaxationPolicy {
    pub fn new(relaxed: bool) -> Self {
        Self {
            relaxed,
            via_seen: AtomicBool::new(false),
            network_changes: AtomicU64::new(0),
        }
    }

    pub fn is_relaxed(&self) -> bool {
        self.relaxed
    }

    pub fn state(&self) -> RelaxationState {
        if self.via_seen.load(Ordering::Relaxed) {
            RelaxationState::Confirmed
        } else {
            RelaxationState::Unconfirmed
        }
    }

    /// Record a trusted response carrying the via marker.
    ///
    /// Returns true on the Unconfirmed → Confirmed transition.
    pub fn observe_via_marker(&self) -> bool {
        let was_seen = self.via_seen.swap(true, Ordering::Relaxed);
        if !was_seen {
            debug!("Via marker confirmed on current network");
        }
        !was_seen
    }

    /// Forget the confirmation; the next response must carry the marker again.
    pub fn on_network_change(&self) {
        self.via_seen.store(false, Ordering::Relaxed);
        let changes = self.network_changes.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(network_changes = changes, "Via marker confirmation reset");
    }

    /// Whether a response missing the via marker may be accepted
    pub fn allows_missing_via(&self) -> bool {
        self.relaxed && self.state() == RelaxationState::Confirmed
    }

    /// Number of network changes observed since startup
    pub fn network_changes(&self) -> u64 {
        self.network_changes.load(Ordering::Relaxed)
    }

    /// Reset the policy on every network change published on `changes`
    /// (call in a spawned task).
    ///
    /// Stops when the change sender is dropped or shutdown is signalled.
    pub async fn watch_network_changes(
        self: Arc<Self>,
        mut changes: watch::Receiver<u64>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Starting network change watcher");

        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        info!("Network change source closed, stopping watcher");
                        break;
                    }
                    let generation = *changes.borrow_and_update();
                    info!(generation, "Network changed");
                    self.on_network_change();
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!("Network change watcher shutting down");
                        break;
                    }
                }
            }
        }
    }
}

impl Default for RelaxationPolicy {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Publishes network changes to watchers
pub struct NetworkChangeNotifier {
    tx: watch::Sender<u64>,
}

impl NetworkChangeNotifier {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Announce a network change, returning the new generation
    pub fn notify(&self) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|g| {
            *g += 1;
            generation = *g;
        });
        generation
    }
}

impl Default for NetworkChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_state_transitions() {
        let policy = RelaxationPolicy::new(true);
        assert_eq!(policy.state(), RelaxationState::Unconfirmed);
        assert!(!policy.allows_missing_via());

        assert!(policy.observe_via_marker());
        assert!(!policy.observe_via_marker());
        assert_eq!(policy.state(), RelaxationState::Confirmed);
        assert!(policy.allows_missing_via());

        policy.on_network_change();
        assert_eq!(policy.state(), RelaxationState::Unconfirmed);
        assert!(!policy.allows_missing_via());
        assert_eq!(policy.network_changes(), 1);
    }

    #[test]
    fn test_strict_mode_never_allows_missing_via() {
        let policy = RelaxationPolicy::default();
        policy.observe_via_marker();
        assert_eq!(policy.state(), RelaxationState::Confirmed);
        assert!(!policy.allows_missing_via());
    }

    #[tokio::test]
    async fn test_watcher_resets_on_network_change() {
        let policy = Arc::new(RelaxationPolicy::new(true));
        let notifier = NetworkChangeNotifier::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(
            policy
                .clone()
                .watch_network_changes(notifier.subscribe(), shutdown_rx),
        );

        policy.observe_via_marker();
        assert_eq!(notifier.notify(), 1);

        let mut reset = false;
        for _ in 0..100 {
            if policy.network_changes() == 1 {
                reset = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(reset);
        assert_eq!(policy.state(), RelaxationState::Unconfirmed);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_watcher_stops_when_source_dropped() {
        let policy = Arc::new(RelaxationPolicy::new(true));
        let notifier = NetworkChangeNotifier::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(
            policy
                .clone()
                .watch_network_changes(notifier.subscribe(), shutdown_rx),
        );
        drop(notifier);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(policy.network_changes(), 0);
    }
}
