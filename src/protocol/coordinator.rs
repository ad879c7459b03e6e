//! Retry-penalty coordination
//!
//! Turns a [`BypassAction`] into penalties against the proxy configuration
//! and a retry decision for the transaction layer.

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::models::{BypassAction, ProxyChain, ProxyServer, RetryDecision, RetryTarget};

use super::idempotency::is_idempotent;

/// Capability of the proxy configuration collaborator to take proxies out of
/// rotation
///
/// Implementations own the retry-penalty table; the engine only writes to it.
pub trait ProxyConfigurator: Send + Sync {
    /// Mark every proxy in `proxies` as bad for `delay`
    fn mark_proxies_bad(&self, proxies: &[ProxyServer], delay: Duration) -> Result<()>;
}

/// Applies bypass actions to the proxy configuration
pub struct RetryCoordinator {
    proxies: Arc<dyn ProxyConfigurator>,
}

impl RetryCoordinator {
    pub fn new(proxies: Arc<dyn ProxyConfigurator>) -> Self {
        Self { proxies }
    }

    /// Record penalties for `action` and decide whether to retry the request
    pub fn apply(&self, action: BypassAction, method: &Method, chain: &ProxyChain) -> RetryDecision {
        if !action.is_bypass() {
            return RetryDecision::deliver(0);
        }

        let penalized = match action.penalty() {
            Some(delay) => self.penalize(Self::penalized_proxies(action, chain), delay),
            None => 0,
        };

        let target = match action {
            BypassAction::BypassCurrentProxy(_) => chain
                .next_after_current()
                .cloned()
                .map(RetryTarget::Proxy)
                .unwrap_or(RetryTarget::Direct),
            _ => RetryTarget::Direct,
        };
        Self::retry_if_idempotent(method, target, penalized)
    }

    fn penalized_proxies(action: BypassAction, chain: &ProxyChain) -> &[ProxyServer] {
        match action {
            BypassAction::BypassCurrentProxy(_) => {
                chain.current().map(std::slice::from_ref).unwrap_or(&[])
            }
            _ => chain.servers(),
        }
    }

    /// Returns the number of proxies penalized
    fn penalize(&self, proxies: &[ProxyServer], delay: Duration) -> usize {
        if proxies.is_empty() {
            warn!("Bypass requested but no proxy served the response");
            return 0;
        }

        match self.proxies.mark_proxies_bad(proxies, delay) {
            Ok(()) => {
                for proxy in proxies {
                    info!(
                        proxy = %proxy.host_port(),
                        delay_secs = delay.as_secs(),
                        "Proxy marked bad"
                    );
                }
                proxies.len()
            }
            Err(e) if e.is_collaborator_failure() => {
                warn!(error = %e, "Proxy configuration rejected penalty");
                0
            }
            Err(e) => {
                error!(error = %e, "Failed to record proxy penalty");
                0
            }
        }
    }

    fn retry_if_idempotent(method: &Method, target: RetryTarget, penalized: usize) -> RetryDecision {
        if is_idempotent(method) {
            debug!(method = %method, target = ?target, "Retrying bypassed request");
            RetryDecision::retry(target, penalized)
        } else {
            debug!(method = %method, "Not retrying non-idempotent request, delivering original response");
            RetryDecision::deliver(penalized)
        }
    }
}
