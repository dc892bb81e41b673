//! Offline flag maintained from a reachability signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ports::ReachabilitySignal;

/// Tracks whether outbound calls are currently feasible.
///
/// The engine is offline when the signal reports no connectivity or when an
/// operator forced it with [`mark_offline`](Self::mark_offline). Until
/// [`start`](Self::start) samples the signal the monitor assumes online.
pub struct ReachabilityMonitor {
    signal: Arc<dyn ReachabilitySignal>,
    online: Arc<AtomicBool>,
    forced_offline: AtomicBool,
    started: AtomicBool,
    cancellation: CancellationToken,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ReachabilityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReachabilityMonitor")
            .field("online", &self.online.load(Ordering::Relaxed))
            .field("forced_offline", &self.forced_offline.load(Ordering::Relaxed))
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ReachabilityMonitor {
    pub fn new(signal: Arc<dyn ReachabilitySignal>) -> Self {
        Self {
            signal,
            online: Arc::new(AtomicBool::new(true)),
            forced_offline: AtomicBool::new(false),
            started: AtomicBool::new(false),
            cancellation: CancellationToken::new(),
            subscription: Mutex::new(None),
        }
    }

    /// Probe the signal once, then follow its transitions in the background.
    ///
    /// Idempotent: only the first call probes and subscribes. Returns whether
    /// this call did the work.
    pub async fn start(&self) -> bool {
        if self.started.swap(true, Ordering::AcqRel) {
            return false;
        }

        let mut receiver = self.signal.subscribe();
        // Transitions before the probe are covered by the probe itself.
        let _ = receiver.borrow_and_update();

        let online = self.signal.probe().await;
        self.online.store(online, Ordering::Release);
        info!(online, "Reachability monitor started");

        let handle = tokio::spawn(follow(receiver, Arc::clone(&self.online), self.cancellation.clone()));
        *self.subscription.lock() = Some(handle);
        true
    }

    /// True when remote attempts should be skipped.
    pub fn is_offline(&self) -> bool {
        self.forced_offline.load(Ordering::Acquire) || !self.online.load(Ordering::Acquire)
    }

    /// Connectivity as last reported by the signal, ignoring the override.
    pub fn signal_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Force the offline path regardless of the signal.
    pub fn mark_offline(&self) {
        if !self.forced_offline.swap(true, Ordering::AcqRel) {
            info!("Offline mode forced");
        }
    }

    /// Clear a forced offline override.
    pub fn mark_online(&self) {
        if self.forced_offline.swap(false, Ordering::AcqRel) {
            info!("Offline override cleared");
        }
    }

    pub fn is_forced_offline(&self) -> bool {
        self.forced_offline.load(Ordering::Acquire)
    }

    /// Stop following the signal.
    pub async fn shutdown(&self) {
        self.cancellation.cancel();
        let handle = self.subscription.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "Reachability subscription terminated abnormally");
            }
        }
    }
}

impl Drop for ReachabilityMonitor {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

async fn follow(mut receiver: watch::Receiver<bool>, online: Arc<AtomicBool>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            changed = receiver.changed() => {
                if changed.is_err() {
                    debug!("Reachability signal closed");
                    break;
                }
                let now_online = *receiver.borrow_and_update();
                let was_online = online.swap(now_online, Ordering::AcqRel);
                if was_online != now_online {
                    if now_online {
                        info!("Network reachable again");
                    } else {
                        warn!("Network unreachable, remote attempts suspended");
                    }
                }
            }
        }
    }
}
