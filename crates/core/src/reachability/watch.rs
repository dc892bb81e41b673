//! Manually driven reachability signal.

use async_trait::async_trait;
use tokio::sync::watch;

use super::ports::ReachabilitySignal;

/// Signal whose state is set by the embedding application, typically from
/// operating-system connectivity events.
#[derive(Debug)]
pub struct WatchReachability {
    sender: watch::Sender<bool>,
}

impl WatchReachability {
    pub fn new(online: bool) -> Self {
        let (sender, _receiver) = watch::channel(online);
        Self { sender }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    /// Publish the current connectivity. Subscribers are only woken on change.
    pub fn set_online(&self, online: bool) {
        self.sender.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for WatchReachability {
    fn default() -> Self {
        Self::online()
    }
}

#[async_trait]
impl ReachabilitySignal for WatchReachability {
    async fn probe(&self) -> bool {
        self.is_online()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}
