use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::config::PipelineConfig;
use crate::pipeline::domain::{
    BatchId, BusinessProjection, DegradationForecast, FraudAssessment, InputRecord, RecordOutcome,
    RiskLevel, StageKind, StagePayload, StageResult, ValidationFindings, Verdict,
};
use crate::pipeline::scheduler::BatchScheduler;
use crate::pipeline::snapshot::BatchSnapshot;
use crate::pipeline::stages::{Stage, StageFailure};
use crate::pipeline::store::{InMemoryJobStore, JobStore, StoreError};

pub(crate) fn sample_record(npi: &str, name: &str) -> InputRecord {
    InputRecord {
        npi: npi.to_string(),
        name: name.to_string(),
        specialty: Some("Cardiology".to_string()),
        last_updated: Some(chrono::Utc::now().date_naive() - chrono::Duration::days(5)),
        document_ref: None,
    }
}

pub(crate) fn clean_batch(count: usize) -> Vec<InputRecord> {
    (0..count)
        .map(|index| sample_record(&format!("99000000{index:02}"), &format!("Provider {index}")))
        .collect()
}

pub(crate) fn payload_for(kind: StageKind) -> StagePayload {
    match kind {
        StageKind::Validation => StagePayload::Validation(ValidationFindings {
            npi_valid: true,
            oig_excluded: false,
            registry_name_match: true,
            conflicts: Vec::new(),
            sources_checked: Vec::new(),
        }),
        StageKind::Fraud => StagePayload::Fraud(FraudAssessment {
            risk_score: 0.0,
            risk_level: RiskLevel::Low,
            flagged_patterns: Vec::new(),
        }),
        StageKind::Degradation => StagePayload::Degradation(DegradationForecast {
            decay_probability: 0.1,
            predicted_degradation_date: None,
            factors: Vec::new(),
        }),
        StageKind::Business => StagePayload::Business(BusinessProjection {
            estimated_savings: 300.0,
            roi_multiplier: 3.5,
            notes: "ok".to_string(),
        }),
    }
}

pub(crate) fn passing_result(kind: StageKind) -> StageResult {
    StageResult {
        stage: kind,
        verdict: Verdict::Pass,
        summary: "stubbed".to_string(),
        payload: payload_for(kind),
    }
}

/// Stage double that always succeeds with a pass verdict.
pub(crate) struct StubStage {
    kind: StageKind,
}

impl StubStage {
    pub(crate) fn passing(kind: StageKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Stage for StubStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn run(
        &self,
        _record: &InputRecord,
        _prior: &[StageResult],
    ) -> Result<StageResult, StageFailure> {
        Ok(passing_result(self.kind))
    }
}

/// Stage double that always fails with a fixed reason.
pub(crate) struct FailingStage {
    kind: StageKind,
    reason: String,
}

impl FailingStage {
    pub(crate) fn new(kind: StageKind, reason: &str) -> Self {
        Self {
            kind,
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn run(
        &self,
        _record: &InputRecord,
        _prior: &[StageResult],
    ) -> Result<StageResult, StageFailure> {
        Err(StageFailure::new(self.reason.clone()))
    }
}

/// Stage double that sleeps before succeeding, for timeout coverage.
pub(crate) struct SlowStage {
    kind: StageKind,
    delay: Duration,
}

impl SlowStage {
    pub(crate) fn new(kind: StageKind, delay: Duration) -> Self {
        Self { kind, delay }
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn run(
        &self,
        _record: &InputRecord,
        _prior: &[StageResult],
    ) -> Result<StageResult, StageFailure> {
        tokio::time::sleep(self.delay).await;
        Ok(passing_result(self.kind))
    }
}

/// Stage double that parks on a semaphore and records how many records
/// were inside it at once, for concurrency-bound assertions.
pub(crate) struct GatedStage {
    pub(crate) gate: Arc<Semaphore>,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: Arc<AtomicUsize>,
}

impl GatedStage {
    pub(crate) fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            in_flight: AtomicUsize::new(0),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Stage for GatedStage {
    fn kind(&self) -> StageKind {
        StageKind::Validation
    }

    async fn run(
        &self,
        _record: &InputRecord,
        _prior: &[StageResult],
    ) -> Result<StageResult, StageFailure> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| StageFailure::new("gate closed"))?;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(passing_result(StageKind::Validation))
    }
}

/// Store wrapper that can be told to reject record writes, to exercise
/// the orchestration-failure path.
#[derive(Clone, Default)]
pub(crate) struct FaultyStore {
    inner: InMemoryJobStore,
    pub(crate) fail_record_writes: Arc<AtomicBool>,
}

impl JobStore for FaultyStore {
    fn create_batch(&self, records: Vec<InputRecord>) -> Result<BatchId, StoreError> {
        self.inner.create_batch(records)
    }

    fn mark_processing(&self, batch_id: &BatchId) -> Result<(), StoreError> {
        self.inner.mark_processing(batch_id)
    }

    fn update_record_outcome(
        &self,
        batch_id: &BatchId,
        outcome: RecordOutcome,
    ) -> Result<(), StoreError> {
        if self.fail_record_writes.load(Ordering::SeqCst) {
            return Err(StoreError::RecordNotFound);
        }
        self.inner.update_record_outcome(batch_id, outcome)
    }

    fn mark_terminal(
        &self,
        batch_id: &BatchId,
        state: crate::pipeline::domain::BatchState,
    ) -> Result<(), StoreError> {
        self.inner.mark_terminal(batch_id, state)
    }

    fn snapshot(&self, batch_id: &BatchId) -> Result<BatchSnapshot, StoreError> {
        self.inner.snapshot(batch_id)
    }

    fn batch_count(&self) -> usize {
        self.inner.batch_count()
    }
}

pub(crate) fn quick_config(max_concurrent_records: usize) -> PipelineConfig {
    PipelineConfig {
        max_batch_size: 100,
        max_concurrent_records,
        global_max_concurrent: None,
        stage_timeout: Duration::from_secs(5),
    }
}

pub(crate) fn stub_lineup() -> Vec<Arc<dyn Stage>> {
    StageKind::ALL
        .iter()
        .map(|kind| Arc::new(StubStage::passing(*kind)) as Arc<dyn Stage>)
        .collect()
}

pub(crate) fn scheduler_with_stages(
    stages: Vec<Arc<dyn Stage>>,
    config: PipelineConfig,
) -> (Arc<BatchScheduler<InMemoryJobStore>>, Arc<InMemoryJobStore>) {
    let store = Arc::new(InMemoryJobStore::new());
    let scheduler = Arc::new(BatchScheduler::new(Arc::clone(&store), stages, config));
    (scheduler, store)
}

/// Poll the store until the batch reaches a terminal state; panics after
/// a generous deadline so a wedged batch fails the test loudly.
pub(crate) async fn wait_until_terminal<S: JobStore>(
    store: &S,
    batch_id: &BatchId,
) -> BatchSnapshot {
    for _ in 0..2_000 {
        let snapshot = store.snapshot(batch_id).expect("batch exists");
        if snapshot.state.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("batch {batch_id} never reached a terminal state");
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
