use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    BatchId, BatchState, InputRecord, RecordId, RecordOutcome, RecordState, StageError,
    StageKind, StagePayload, StageResult,
};

/// Client-facing view of one record: identity plus current outcome. Built
/// fresh per poll and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    pub record_id: RecordId,
    pub npi: String,
    pub name: String,
    pub state: RecordState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stage_results: Vec<StageResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

impl RecordView {
    pub(crate) fn from_outcome(input: &InputRecord, outcome: &RecordOutcome) -> Self {
        Self {
            record_id: outcome.record_id.clone(),
            npi: input.npi.clone(),
            name: input.name.clone(),
            state: outcome.state,
            stage_results: outcome.stage_results.clone(),
            error: outcome.error.clone(),
        }
    }

    fn fraud_risk_score(&self) -> Option<f64> {
        self.stage_results.iter().find_map(|result| match &result.payload {
            StagePayload::Fraud(assessment) => Some(assessment.risk_score),
            _ => None,
        })
    }

    fn estimated_savings(&self) -> Option<f64> {
        self.stage_results.iter().find_map(|result| match &result.payload {
            StagePayload::Business(projection) => Some(projection.estimated_savings),
            _ => None,
        })
    }

    /// A record counts as a discrepancy when it errored or any stage came
    /// back with a warn/fail verdict.
    fn is_discrepancy(&self) -> bool {
        self.state == RecordState::Errored
            || self
                .stage_results
                .iter()
                .any(|result| result.verdict != super::domain::Verdict::Pass)
    }
}

/// Named point in an aggregate chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: f64,
}

/// Aggregate rollup attached to completed snapshots. Field names follow
/// the dashboard contract, hence the camelCase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRollup {
    pub providers_processed: usize,
    pub records_errored: usize,
    pub discrepancies_found: usize,
    pub average_risk_score: f64,
    pub estimated_savings: f64,
    pub risk_distribution: Vec<ChartPoint>,
    pub summary: String,
}

impl BatchRollup {
    fn from_records(records: &[RecordView]) -> Self {
        let providers_processed = records.len();
        let records_errored = records
            .iter()
            .filter(|view| view.state == RecordState::Errored)
            .count();
        let discrepancies_found = records.iter().filter(|view| view.is_discrepancy()).count();

        let risk_scores: Vec<f64> = records
            .iter()
            .filter_map(RecordView::fraud_risk_score)
            .collect();
        let average_risk_score = if risk_scores.is_empty() {
            0.0
        } else {
            (risk_scores.iter().sum::<f64>() / risk_scores.len() as f64).round()
        };
        let estimated_savings: f64 = records
            .iter()
            .filter_map(RecordView::estimated_savings)
            .sum();

        let low = risk_scores.iter().filter(|score| **score <= 30.0).count();
        let medium = risk_scores
            .iter()
            .filter(|score| **score > 30.0 && **score <= 70.0)
            .count();
        let high = risk_scores.iter().filter(|score| **score > 70.0).count();
        let risk_distribution = vec![
            ChartPoint {
                name: "Low Risk".to_string(),
                value: low as f64,
            },
            ChartPoint {
                name: "Medium Risk".to_string(),
                value: medium as f64,
            },
            ChartPoint {
                name: "High Risk".to_string(),
                value: high as f64,
            },
        ];

        let summary = format!(
            "Validated {providers_processed} providers. Found {discrepancies_found} \
             discrepancies. Trust score avg {:.0}/100.",
            100.0 - average_risk_score
        );

        Self {
            providers_processed,
            records_errored,
            discrepancies_found,
            average_risk_score,
            estimated_savings,
            risk_distribution,
            summary,
        }
    }
}

/// Consistent point-in-time view of a batch and all its record outcomes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSnapshot {
    #[serde(rename = "job_id")]
    pub batch_id: BatchId,
    #[serde(rename = "status")]
    pub state: BatchState,
    pub created_at: DateTime<Utc>,
    pub total_records: usize,
    pub records_done: usize,
    pub records_errored: usize,
    pub records: Vec<RecordView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollup: Option<BatchRollup>,
}

impl BatchSnapshot {
    pub(crate) fn assemble(
        batch_id: BatchId,
        state: BatchState,
        created_at: DateTime<Utc>,
        records: Vec<RecordView>,
    ) -> Self {
        let total_records = records.len();
        let records_done = records
            .iter()
            .filter(|view| view.state == RecordState::Done)
            .count();
        let records_errored = records
            .iter()
            .filter(|view| view.state == RecordState::Errored)
            .count();
        let rollup = if state == BatchState::Completed {
            Some(BatchRollup::from_records(&records))
        } else {
            None
        };

        Self {
            batch_id,
            state,
            created_at,
            total_records,
            records_done,
            records_errored,
            records,
            rollup,
        }
    }

    pub fn records_running(&self) -> usize {
        self.records
            .iter()
            .filter(|view| view.state == RecordState::Running)
            .count()
    }

    pub fn record(&self, record_id: &RecordId) -> Option<&RecordView> {
        self.records
            .iter()
            .find(|view| &view.record_id == record_id)
    }

    /// Verifies the fixed stage order with no gaps for one record view.
    pub fn stage_order_is_canonical(view: &RecordView) -> bool {
        view.stage_results
            .iter()
            .zip(StageKind::ALL.iter())
            .filter(|(result, expected)| result.stage == **expected)
            .count()
            == view.stage_results.len()
    }
}
