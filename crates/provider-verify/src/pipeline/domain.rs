use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a submitted batch, opaque to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub String);

impl BatchId {
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for one record inside a batch, stable across polls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    /// Records are identified by their position in the submitted batch.
    pub fn positional(index: usize) -> Self {
        Self(format!("rec-{:04}", index + 1))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw provider data submitted for analysis. Immutable once part of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub npi: String,
    pub name: String,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub last_updated: Option<NaiveDate>,
    /// Reference to an uploaded document; opaque to the orchestration layer.
    #[serde(default)]
    pub document_ref: Option<String>,
}

/// The four analysis stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Validation,
    Fraud,
    Degradation,
    Business,
}

impl StageKind {
    /// Fixed total order the runner executes stages in.
    pub const ALL: [StageKind; 4] = [
        StageKind::Validation,
        StageKind::Fraud,
        StageKind::Degradation,
        StageKind::Business,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StageKind::Validation => "Validation",
            StageKind::Fraud => "Fraud",
            StageKind::Degradation => "Degradation",
            StageKind::Business => "Business",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rollup verdict attached to every stage result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

/// Findings produced by the validation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFindings {
    pub npi_valid: bool,
    pub oig_excluded: bool,
    pub registry_name_match: bool,
    pub conflicts: Vec<String>,
    pub sources_checked: Vec<String>,
}

/// Banded fraud risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Score and flags produced by the fraud stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub flagged_patterns: Vec<String>,
}

/// Staleness forecast produced by the degradation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationForecast {
    pub decay_probability: f64,
    pub predicted_degradation_date: Option<NaiveDate>,
    pub factors: Vec<String>,
}

/// Dollar impact estimate produced by the business stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessProjection {
    pub estimated_savings: f64,
    pub roi_multiplier: f64,
    pub notes: String,
}

/// Stage-specific payload carried by a [`StageResult`]. The orchestration
/// layer never inspects it; only later stages and the rollup do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StagePayload {
    Validation(ValidationFindings),
    Fraud(FraudAssessment),
    Degradation(DegradationForecast),
    Business(BusinessProjection),
}

/// Immutable output of one stage run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: StageKind,
    pub verdict: Verdict,
    pub summary: String,
    pub payload: StagePayload,
}

/// Which stage failed and why, recorded on an errored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: StageKind,
    pub reason: String,
}

/// Per-record lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Pending,
    Running,
    Done,
    Errored,
}

impl RecordState {
    /// Position along the forward-only transition order. The two terminal
    /// states share a rank; neither may replace the other.
    pub(crate) fn rank(self) -> u8 {
        match self {
            RecordState::Pending => 0,
            RecordState::Running => 1,
            RecordState::Done | RecordState::Errored => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RecordState::Done | RecordState::Errored)
    }
}

/// Batch-level lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    Queued,
    Processing,
    Completed,
    /// Orchestration-level fault; a single record's stage failure never
    /// lands here. Serialized as `error` per the polling contract.
    #[serde(rename = "error")]
    Failed,
}

impl BatchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchState::Completed | BatchState::Failed)
    }

    /// Wire-format name, matching how the state serializes in snapshots.
    pub fn label(self) -> &'static str {
        match self {
            BatchState::Queued => "queued",
            BatchState::Processing => "processing",
            BatchState::Completed => "completed",
            BatchState::Failed => "error",
        }
    }
}

/// Result container for one record: ordered stage results plus lifecycle
/// state and, for errored records, the failing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub record_id: RecordId,
    pub state: RecordState,
    pub stage_results: Vec<StageResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

impl RecordOutcome {
    pub fn pending(record_id: RecordId) -> Self {
        Self {
            record_id,
            state: RecordState::Pending,
            stage_results: Vec::new(),
            error: None,
        }
    }
}
