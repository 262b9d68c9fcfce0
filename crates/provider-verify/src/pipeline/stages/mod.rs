//! The fixed four-stage analysis lineup and the trait that keeps the
//! runner agnostic to stage internals.

mod business;
mod degradation;
mod fraud;
mod validation;

use std::sync::Arc;

use async_trait::async_trait;

use super::domain::{
    DegradationForecast, FraudAssessment, InputRecord, StageKind, StagePayload, StageResult,
    ValidationFindings,
};

pub use business::BusinessStage;
pub use degradation::DegradationStage;
pub use fraud::FraudStage;
pub use validation::ValidationStage;

/// Raised by a stage that cannot produce a usable result. The runner turns
/// this into the record's terminal error and skips the remaining stages.
#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct StageFailure {
    pub reason: String,
}

impl StageFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// One step of the analysis pipeline. Implementations are stateless and
/// side-effect free beyond their returned result; any external call they
/// make is bounded by the runner's per-stage timeout.
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Analyze `record` given every earlier stage's result, in execution
    /// order. Stages never retry internally unless they own that policy.
    async fn run(
        &self,
        record: &InputRecord,
        prior: &[StageResult],
    ) -> Result<StageResult, StageFailure>;
}

/// The production lineup, in the fixed execution order.
pub fn standard_lineup() -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(ValidationStage),
        Arc::new(FraudStage),
        Arc::new(DegradationStage::default()),
        Arc::new(BusinessStage),
    ]
}

pub(crate) fn validation_findings(prior: &[StageResult]) -> Option<&ValidationFindings> {
    prior.iter().find_map(|result| match &result.payload {
        StagePayload::Validation(findings) => Some(findings),
        _ => None,
    })
}

pub(crate) fn fraud_assessment(prior: &[StageResult]) -> Option<&FraudAssessment> {
    prior.iter().find_map(|result| match &result.payload {
        StagePayload::Fraud(assessment) => Some(assessment),
        _ => None,
    })
}

pub(crate) fn degradation_forecast(prior: &[StageResult]) -> Option<&DegradationForecast> {
    prior.iter().find_map(|result| match &result.payload {
        StagePayload::Degradation(forecast) => Some(forecast),
        _ => None,
    })
}
