//! Reachability from periodic TCP connects to the remote host.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oncovista_core::ReachabilitySignal;
use oncovista_domain::{Config, OncoVistaError};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::InfraError;

/// Publishes online/offline transitions by connecting to `address` every
/// `interval`. The host counts as reachable when a connection is established
/// within `timeout`.
pub struct TcpReachabilityProbe {
    address: String,
    timeout: Duration,
    interval: Duration,
    sender: Arc<watch::Sender<bool>>,
    cancellation: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TcpReachabilityProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpReachabilityProbe")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .field("interval", &self.interval)
            .field("online", &*self.sender.borrow())
            .finish_non_exhaustive()
    }
}

impl TcpReachabilityProbe {
    /// Probe for `address` (`host:port`). Reports online until the first
    /// check says otherwise.
    pub fn new(address: impl Into<String>, timeout: Duration, interval: Duration) -> Self {
        let (sender, _) = watch::channel(true);
        Self {
            address: address.into(),
            timeout,
            interval,
            sender: Arc::new(sender),
            cancellation: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Probe for the configured address, or the remote service host when no
    /// address is configured.
    pub fn from_config(config: &Config) -> Result<Self, OncoVistaError> {
        let address = match &config.reachability.probe_address {
            Some(address) => address.clone(),
            None => address_for(&config.remote.base_url).map_err(OncoVistaError::from)?,
        };
        Ok(Self::new(address, config.reachability.probe_timeout(), config.reachability.probe_interval()))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Spawn the periodic check. Returns `false` if it is already running.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock();
        if task.is_some() {
            return false;
        }

        let address = self.address.clone();
        let timeout = self.timeout;
        let interval = self.interval;
        let sender = Arc::clone(&self.sender);
        let cancel = self.cancellation.clone();

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("Reachability probe cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let online = connect(&address, timeout).await;
                        publish(&sender, &address, online);
                    }
                }
            }
        }));
        info!(address = %self.address, interval_secs = self.interval.as_secs(), "Reachability probe started");
        true
    }

    /// Stop the periodic check and wait for it to finish.
    pub async fn stop(&self) {
        self.cancellation.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "Reachability probe task terminated abnormally");
            }
        }
    }
}

impl Drop for TcpReachabilityProbe {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

#[async_trait]
impl ReachabilitySignal for TcpReachabilityProbe {
    async fn probe(&self) -> bool {
        let online = connect(&self.address, self.timeout).await;
        publish(&self.sender, &self.address, online);
        online
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

async fn connect(address: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            debug!(address, error = %err, "Reachability connect failed");
            false
        }
        Err(_) => {
            debug!(address, timeout_ms = timeout.as_millis(), "Reachability connect timed out");
            false
        }
    }
}

fn publish(sender: &watch::Sender<bool>, address: &str, online: bool) {
    let changed = sender.send_if_modified(|current| {
        if *current == online {
            return false;
        }
        *current = online;
        true
    });
    if changed {
        if online {
            info!(address, "Remote host reachable again");
        } else {
            warn!(address, "Remote host unreachable");
        }
    }
}

/// `host:port` of the service at `base_url`.
fn address_for(base_url: &str) -> Result<String, InfraError> {
    let url = Url::parse(base_url.trim())?;
    let host = url
        .host_str()
        .ok_or_else(|| OncoVistaError::Config(format!("remote.base_url has no host: {base_url}")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| OncoVistaError::Config(format!("remote.base_url has no port: {base_url}")))?;
    Ok(format!("{host}:{port}"))
}
