//! Network reachability tracking.
//!
//! [`ReachabilityMonitor`] keeps the current offline flag the engine
//! consults before attempting the remote service. It is fed by a
//! [`ReachabilitySignal`]: [`WatchReachability`] for hosts that push OS
//! connectivity events, or a probing adapter from the infra crate.

pub mod monitor;
pub mod ports;
pub mod watch;

pub use monitor::ReachabilityMonitor;
pub use ports::ReachabilitySignal;
pub use watch::WatchReachability;
