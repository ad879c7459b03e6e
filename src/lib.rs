//! Veer - Proxy Bypass Decision Engine
//!
//! Decides, for every response received through a compressing forward proxy,
//! whether the client should stop using that proxy and whether the request
//! should be retried elsewhere.
//!
//! ## Features
//!
//! - `block=`, `bypass=` and `block-once` proxy-control directives
//! - Via marker checks with network-change relaxation
//! - Retry-penalty recording against a pluggable proxy configuration
//! - Idempotency-aware retry decisions
//! - Bypass event statistics with JSON snapshots
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use http::{HeaderMap, Method, StatusCode};
//! use veer::{BypassConfig, BypassProtocol, ProxyChain, ProxyRetryTable, ResponseDescriptor};
//!
//! # fn main() -> veer::Result<()> {
//! let table = Arc::new(ProxyRetryTable::new());
//! let protocol = BypassProtocol::from_config(&BypassConfig::default(), table.clone())?;
//! let chain = ProxyChain::parse("https://proxy.example.com:443")?;
//!
//! let resp = ResponseDescriptor::new(Method::GET, StatusCode::BAD_GATEWAY, HeaderMap::new());
//! let outcome = protocol.on_response(&resp, &chain);
//! assert!(outcome.retry.retry);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod protocol;

pub use config::{BypassConfig, Config, LogConfig};
pub use error::{Result, VeerError};
pub use models::{
    BypassAction, BypassDecision, BypassEventType, ProxyChain, ProxyScheme, ProxyServer,
    ResponseDescriptor, RetryDecision, RetryTarget, TransportError,
};
pub use protocol::{
    BypassOutcome, BypassProtocol, BypassStats, NetworkChangeNotifier, ProxyConfigurator,
    ProxyRetryTable, RelaxationPolicy,
};
