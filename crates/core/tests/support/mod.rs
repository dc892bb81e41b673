//! Shared test helpers for `oncovista-core` integration tests.
//!
//! A scripted remote service, a collecting audit sink and a harness that
//! wires an engine to a mock clock and a recording sleeper, so breaker
//! cooldowns, backoff and TTLs run without real waiting.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use oncovista_common::testing::{FlakyStore, RecordingSleeper};
use oncovista_common::{AttemptError, MockClock};
use oncovista_core::{
    AuditSink, BasicProtocolRules, FallbackGenerator, RecommendationEngine, RecommendationService,
    SinkError, WatchReachability,
};
use oncovista_domain::{
    AuditRecord, Config, Recommendation, RemoteRecommendation, RemoteRecommendationResponse,
    TreatmentQuery,
};
use parking_lot::Mutex;

/// How the scripted service answers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    /// Answer with two recommendations at the given overall confidence.
    Healthy(f64),
    /// Fail with the given HTTP status.
    Fail(u16),
    /// Answer 200 with an empty recommendation list.
    Empty,
    /// Never answer.
    Hang,
}

/// Remote service double that counts calls.
#[derive(Debug)]
pub struct ScriptedService {
    behavior: Mutex<Behavior>,
    calls: AtomicU32,
}

impl ScriptedService {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self { behavior: Mutex::new(behavior), calls: AtomicU32::new(0) })
    }

    pub fn healthy() -> Arc<Self> {
        Self::new(Behavior::Healthy(0.9))
    }

    pub fn failing() -> Arc<Self> {
        Self::new(Behavior::Fail(503))
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecommendationService for ScriptedService {
    async fn call(&self, query: &TreatmentQuery) -> Result<RemoteRecommendationResponse, AttemptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock();
        match behavior {
            Behavior::Healthy(confidence) => Ok(RemoteRecommendationResponse {
                recommendations: vec![
                    remote_recommendation(&format!("{} primary protocol", query.cancer_type), 0.9),
                    remote_recommendation("Alternative A + Alternative B", 0.7),
                ],
                overall_confidence: Some(confidence),
                ..RemoteRecommendationResponse::default()
            }),
            Behavior::Fail(status) => Err(AttemptError::http(Some(status), "service unavailable")),
            Behavior::Empty => Ok(RemoteRecommendationResponse::default()),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

fn remote_recommendation(protocol: &str, score: f64) -> RemoteRecommendation {
    RemoteRecommendation {
        id: None,
        treatment_protocol: protocol.to_string(),
        evidence_reference: Some("Category 1".to_string()),
        nccn_reference: None,
        confidence_score: Some(score),
        reasoning: Some("scripted".to_string()),
        contraindications: Vec::new(),
    }
}

/// Fallback generator that always panics.
#[derive(Debug, Default)]
pub struct PanickingGenerator;

impl FallbackGenerator for PanickingGenerator {
    fn generate(&self, _query: &TreatmentQuery) -> Recommendation {
        panic!("protocol table unavailable");
    }
}

/// Audit sink collecting every delivered record.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<AuditRecord>>,
    fail: AtomicBool,
}

impl CollectingSink {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditSink for CollectingSink {
    async fn send(&self, record: &AuditRecord) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("sink offline".to_string()));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Engine wired to inspectable doubles.
pub struct Harness {
    pub engine: RecommendationEngine<MockClock>,
    pub remote: Arc<ScriptedService>,
    pub clock: MockClock,
    pub sleeper: RecordingSleeper,
    pub signal: Arc<WatchReachability>,
    pub store: FlakyStore,
    pub sink: Arc<CollectingSink>,
}

pub struct HarnessBuilder {
    remote: Arc<ScriptedService>,
    fallback: Arc<dyn FallbackGenerator>,
    config: Config,
    online: bool,
}

impl HarnessBuilder {
    pub fn new(remote: Arc<ScriptedService>) -> Self {
        Self { remote, fallback: Arc::new(BasicProtocolRules), config: Config::default(), online: true }
    }

    pub fn fallback(mut self, fallback: Arc<dyn FallbackGenerator>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.retry.max_retries = retries;
        self
    }

    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    pub async fn build(self) -> Harness {
        let clock = MockClock::new();
        let sleeper = RecordingSleeper::with_clock(clock.clone());
        let signal = Arc::new(WatchReachability::new(self.online));
        let store = FlakyStore::new();
        let sink = Arc::new(CollectingSink::default());

        let engine = RecommendationEngine::builder(self.remote.clone(), self.fallback)
            .config(self.config)
            .store(Arc::new(store.clone()))
            .reachability(signal.clone())
            .audit_sink(sink.clone())
            .sleeper(Arc::new(sleeper.clone()))
            .clock(clock.clone())
            .build()
            .await
            .expect("engine should build from a valid config");

        Harness { engine, remote: self.remote, clock, sleeper, signal, store, sink }
    }
}

pub fn breast_cancer() -> TreatmentQuery {
    TreatmentQuery::new("Breast Cancer")
        .with_stage("II")
        .with_histology("Invasive Ductal Carcinoma")
        .with_biomarkers(["HER2+", "ER+"])
        .with_treatment_intent("Curative")
}

/// A distinct, fully specified query per index.
pub fn query(index: usize) -> TreatmentQuery {
    TreatmentQuery::new("Non-Small Cell Lung Cancer").with_stage(format!("stage-{index}"))
}

/// Let spawned background tasks run on the current-thread runtime.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
