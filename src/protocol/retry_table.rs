//! In-memory retry-penalty table
//!
//! The default [`ProxyConfigurator`]: proxies marked bad are kept out of
//! rotation until their expiry passes. Proxy selection consults
//! [`ProxyRetryTable::is_bad`].

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VeerError};
use crate::models::ProxyServer;

use super::coordinator::ProxyConfigurator;

/// Penalty recorded against one proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryInfoEntry {
    /// Duration of the most recent penalty
    pub current_delay: Duration,
    /// Moment the proxy may be used again
    pub bad_until: DateTime<Utc>,
}

/// Retry-penalty table keyed by proxy `host:port`
#[derive(Debug, Default)]
pub struct ProxyRetryTable {
    entries: Mutex<HashMap<String, RetryInfoEntry>>,
}

impl ProxyRetryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark proxies bad as of `now`.
    ///
    /// An existing penalty takes the new delay and keeps the later expiry.
    /// Delays past the representable range expire at `DateTime::<Utc>::MAX_UTC`.
    pub fn mark_bad_at(
        &self,
        proxies: &[ProxyServer],
        delay: Duration,
        now: DateTime<Utc>,
    ) {
        let bad_until = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut entries = self.entries.lock();
        for proxy in proxies {
            let key = proxy.host_port();
            let entry = entries.entry(key).or_insert(RetryInfoEntry {
                current_delay: delay,
                bad_until,
            });
            entry.current_delay = delay;
            entry.bad_until = entry.bad_until.max(bad_until);
        }
    }

    /// Penalty recorded for a `host:port` key, expired or not
    pub fn get(&self, key: &str) -> Option<RetryInfoEntry> {
        self.entries.lock().get(key).cloned()
    }

    /// Whether `proxy` is still penalized at `now`
    pub fn is_bad(&self, proxy: &ProxyServer, now: DateTime<Utc>) -> bool {
        self.entries
            .lock()
            .get(&proxy.host_port())
            .map(|entry| entry.bad_until > now)
            .unwrap_or(false)
    }

    /// Drop expired penalties, returning how many were removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.bad_until > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired proxy penalties");
        }
        removed
    }

    /// Copy of every entry, sorted by key
    pub fn entries(&self) -> Vec<(String, RetryInfoEntry)> {
        let mut entries: Vec<_> = self
            .entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl ProxyConfigurator for ProxyRetryTable {
    fn mark_proxies_bad(&self, proxies: &[ProxyServer], delay: Duration) -> Result<()> {
        if proxies.is_empty() {
            return Err(VeerError::NoProxiesAvailable);
        }
        self.mark_bad_at(proxies, delay, Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyScheme;
    use chrono::TimeZone;

    fn proxy(host: &str) -> ProxyServer {
        ProxyServer::new(ProxyScheme::Http, host, 80)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_mark_and_expire() {
        let table = ProxyRetryTable::new();
        table.mark_bad_at(&[proxy("a.example")], Duration::from_secs(60), at(0));

        let entry = table.get("a.example:80").unwrap();
        assert_eq!(entry.current_delay, Duration::from_secs(60));
        assert_eq!(entry.bad_until, at(60));

        assert!(table.is_bad(&proxy("a.example"), at(59)));
        assert!(!table.is_bad(&proxy("a.example"), at(60)));
        assert!(!table.is_bad(&proxy("b.example"), at(0)));
    }

    #[test]
    fn test_remark_keeps_later_expiry() {
        let table = ProxyRetryTable::new();
        let p = [proxy("a.example")];

        table.mark_bad_at(&p, Duration::from_secs(300), at(0));
        table.mark_bad_at(&p, Duration::from_secs(1), at(10));

        let entry = table.get("a.example:80").unwrap();
        assert_eq!(entry.current_delay, Duration::from_secs(1));
        assert_eq!(entry.bad_until, at(300));

        table.mark_bad_at(&p, Duration::from_secs(600), at(10));
        assert_eq!(table.get("a.example:80").unwrap().bad_until, at(610));
    }

    #[test]
    fn test_purge_expired() {
        let table = ProxyRetryTable::new();
        table.mark_bad_at(&[proxy("a.example")], Duration::from_secs(10), at(0));
        table.mark_bad_at(&[proxy("b.example")], Duration::from_secs(100), at(0));

        assert_eq!(table.purge_expired(at(50)), 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.entries()[0].0, "b.example:80");

        table.clear();
        assert!(table.is_empty());
    }

    #[test]
    fn test_configurator_rejects_empty_list() {
        let table = ProxyRetryTable::new();
        assert!(matches!(
            table.mark_proxies_bad(&[], Duration::from_secs(1)),
            Err(VeerError::NoProxiesAvailable)
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_huge_delay_saturates_expiry() {
        let table = ProxyRetryTable::new();
        let p = [proxy("a.example")];

        table.mark_proxies_bad(&p, Duration::MAX).unwrap();
        table.mark_bad_at(&p, Duration::from_secs(u64::MAX), at(0));

        let entry = table.get("a.example:80").unwrap();
        assert_eq!(entry.current_delay, Duration::from_secs(u64::MAX));
        assert_eq!(entry.bad_until, DateTime::<Utc>::MAX_UTC);
        assert!(table.is_bad(&p[0], Utc::now()));
        assert_eq!(table.purge_expired(Utc::now()), 0);
    }
}
