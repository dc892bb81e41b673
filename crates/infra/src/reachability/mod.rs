//! Network reachability adapters.

pub mod tcp_probe;

pub use tcp_probe::TcpReachabilityProbe;
