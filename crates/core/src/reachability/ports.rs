//! Port interface for connectivity signals

use async_trait::async_trait;
use tokio::sync::watch;

/// Source of online/offline transitions.
#[async_trait]
pub trait ReachabilitySignal: Send + Sync {
    /// Best-effort check of current connectivity. `true` means online.
    async fn probe(&self) -> bool;

    /// Receiver that observes every online/offline transition.
    fn subscribe(&self) -> watch::Receiver<bool>;
}
