//! Fire-and-forget audit dispatch.
//!
//! [`AuditDispatcher::record`] never blocks and never fails: the record is
//! appended to a bounded local ring (always) and to a bounded delivery queue
//! (when a sink is configured). A detached worker drains the queue into the
//! sink. A full queue drops its oldest pending record.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use oncovista_common::RingBuffer;
use oncovista_domain::{AuditConfig, AuditRecord};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ports::AuditSink;

/// Counters describing dispatcher health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub recorded: u64,
    pub delivered: u64,
    pub failed: u64,
    /// Pending records discarded because the queue was full.
    pub dropped: u64,
    pub pending: usize,
}

struct Shared {
    sink: Option<Arc<dyn AuditSink>>,
    queue: Mutex<VecDeque<AuditRecord>>,
    queue_capacity: usize,
    ring: Mutex<RingBuffer<AuditRecord>>,
    notify: Notify,
    send_timeout: Duration,
    cancellation: CancellationToken,
    recorded: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl Shared {
    async fn deliver(&self, sink: &dyn AuditSink, record: AuditRecord) {
        match tokio::time::timeout(self.send_timeout, sink.send(&record)).await {
            Ok(Ok(())) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(err)) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    retrieval_id = %record.retrieval_id,
                    sequence = record.sequence,
                    error = %err,
                    "Audit sink rejected record"
                );
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    retrieval_id = %record.retrieval_id,
                    timeout_ms = self.send_timeout.as_millis(),
                    "Audit sink timed out"
                );
            }
        }
    }

    fn next(&self) -> Option<AuditRecord> {
        self.queue.lock().pop_front()
    }
}

/// Records retrieval decisions without touching the caller's critical path.
pub struct AuditDispatcher {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl std::fmt::Debug for AuditDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditDispatcher")
            .field("has_sink", &self.shared.sink.is_some())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl AuditDispatcher {
    /// Dispatcher forwarding to `sink`, or keeping records locally only when
    /// `sink` is `None`.
    pub fn new(sink: Option<Arc<dyn AuditSink>>, config: &AuditConfig) -> Self {
        let shared = Shared {
            sink,
            queue: Mutex::new(VecDeque::new()),
            queue_capacity: config.queue_capacity.max(1),
            ring: Mutex::new(RingBuffer::new(config.ring_capacity)),
            notify: Notify::new(),
            send_timeout: config.send_timeout(),
            cancellation: CancellationToken::new(),
            recorded: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        };
        Self { shared: Arc::new(shared), worker: Mutex::new(None), started: AtomicBool::new(false) }
    }

    /// Dispatcher without a durable sink.
    pub fn local_only(config: &AuditConfig) -> Self {
        Self::new(None, config)
    }

    /// Record `record`. Returns immediately.
    pub fn record(&self, record: AuditRecord) {
        self.shared.recorded.fetch_add(1, Ordering::Relaxed);

        if self.shared.sink.is_some() && !self.shared.cancellation.is_cancelled() {
            let dropped = {
                let mut queue = self.shared.queue.lock();
                let dropped = if queue.len() >= self.shared.queue_capacity {
                    queue.pop_front()
                } else {
                    None
                };
                queue.push_back(record.clone());
                dropped
            };
            if let Some(old) = dropped {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(retrieval_id = %old.retrieval_id, "Audit queue full, dropped oldest record");
            }
            self.ensure_worker();
            self.shared.notify.notify_one();
        }

        self.shared.ring.lock().push(record);
    }

    /// The most recent records, oldest first.
    pub fn recent(&self) -> Vec<AuditRecord> {
        self.shared.ring.lock().to_vec()
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            recorded: self.shared.recorded.load(Ordering::Relaxed),
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            pending: self.shared.queue.lock().len(),
        }
    }

    /// Stop the worker after it has attempted every queued record.
    pub async fn shutdown(&self) {
        self.shared.cancellation.cancel();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "Audit worker terminated abnormally");
            }
        }
    }

    fn ensure_worker(&self) {
        if self.started.load(Ordering::Acquire) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime yet, audit records stay queued");
            return;
        };
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(sink) = self.shared.sink.clone() else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        *self.worker.lock() = Some(runtime.spawn(run_worker(shared, sink)));
        debug!("Audit worker started");
    }
}

impl Drop for AuditDispatcher {
    fn drop(&mut self) {
        self.shared.cancellation.cancel();
    }
}

async fn run_worker(shared: Arc<Shared>, sink: Arc<dyn AuditSink>) {
    loop {
        if let Some(record) = shared.next() {
            shared.deliver(sink.as_ref(), record).await;
            continue;
        }
        tokio::select! {
            () = shared.cancellation.cancelled() => break,
            () = shared.notify.notified() => {}
        }
    }

    while let Some(record) = shared.next() {
        shared.deliver(sink.as_ref(), record).await;
    }
    debug!("Audit worker stopped");
}
