//! Wiring of a production engine from [`Config`].

use std::sync::Arc;

use oncovista_common::{KeyValueStore, MemoryStore};
use oncovista_core::{AuditSink, BasicProtocolRules, RecommendationEngine};
use oncovista_domain::{AuditSinkKind, CacheBackend, Config, OncoVistaError, Recommendation, Result};
use tracing::{info, warn};

use crate::audit::{FileAuditSink, HttpAuditSink};
use crate::http::HttpRecommendationClient;
use crate::reachability::TcpReachabilityProbe;
use crate::scheduling::{SweepScheduler, SweepSchedulerConfig};
use crate::storage::FileStore;

/// A running engine together with the background tasks it depends on.
pub struct EngineRuntime {
    engine: Arc<RecommendationEngine>,
    probe: Arc<TcpReachabilityProbe>,
    sweeper: SweepScheduler<Recommendation>,
}

impl std::fmt::Debug for EngineRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRuntime")
            .field("engine", &self.engine)
            .field("probe", &self.probe)
            .field("sweeping", &self.sweeper.is_running())
            .finish()
    }
}

impl EngineRuntime {
    /// Build the adapters named by `config`, assemble the engine and start the
    /// reachability probe and the cache sweep.
    ///
    /// # Errors
    /// Returns `OncoVistaError::Config` for invalid configuration and
    /// `OncoVistaError::Storage` when the cache directory cannot be created.
    pub async fn start(config: Config) -> Result<Self> {
        config.validate()?;

        let remote =
            Arc::new(HttpRecommendationClient::from_config(&config.remote, config.retry.attempt_timeout())?);
        let store = store_for(&config).await?;
        let probe = Arc::new(TcpReachabilityProbe::from_config(&config)?);

        let mut builder = RecommendationEngine::builder(remote, Arc::new(BasicProtocolRules::new()))
            .config(config.clone())
            .store(store)
            .reachability(probe.clone());
        if let Some(sink) = audit_sink_for(&config)? {
            builder = builder.audit_sink(sink);
        }
        let engine = Arc::new(builder.build().await?);

        probe.start();
        let mut sweeper = SweepScheduler::new(
            engine.cache(),
            SweepSchedulerConfig { interval: config.cache.sweep_interval(), ..Default::default() },
        );
        sweeper.start()?;

        info!(
            base_url = %config.remote.base_url,
            probe_address = probe.address(),
            cache_backend = ?config.cache.backend,
            audit_sink = ?config.audit.sink,
            "Engine runtime started"
        );
        Ok(Self { engine, probe, sweeper })
    }

    pub fn engine(&self) -> Arc<RecommendationEngine> {
        Arc::clone(&self.engine)
    }

    /// Stop the sweep and the probe, then drain the engine's audit queue.
    pub async fn shutdown(mut self) {
        if let Err(err) = self.sweeper.stop().await {
            warn!(error = %err, "Cache sweep scheduler did not stop cleanly");
        }
        self.probe.stop().await;
        self.engine.shutdown().await;
        info!("Engine runtime stopped");
    }
}

async fn store_for(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    match (config.cache.backend, &config.cache.directory) {
        (CacheBackend::File, Some(directory)) => {
            let store = FileStore::open(directory)
                .await
                .map_err(|err| OncoVistaError::Storage(err.to_string()))?;
            Ok(Arc::new(store))
        }
        (CacheBackend::File, None) => {
            Err(OncoVistaError::Config("cache.directory is required for the file backend".into()))
        }
        (CacheBackend::Memory, _) => Ok(Arc::new(MemoryStore::new())),
    }
}

fn audit_sink_for(config: &Config) -> Result<Option<Arc<dyn AuditSink>>> {
    let audit = &config.audit;
    match (audit.sink, &audit.url, &audit.file_path) {
        (AuditSinkKind::None, _, _) => Ok(None),
        (AuditSinkKind::Http, Some(url), _) => Ok(Some(Arc::new(HttpAuditSink::new(url, audit.send_timeout())?))),
        (AuditSinkKind::File, _, Some(path)) => Ok(Some(Arc::new(FileAuditSink::new(path.clone())))),
        (kind, _, _) => Err(OncoVistaError::Config(format!("audit sink {kind:?} is missing its target"))),
    }
}
