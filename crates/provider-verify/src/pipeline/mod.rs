//! The job/batch orchestration core: data model, job store, scheduler,
//! record runner, snapshot projection, and the polling router.

pub mod domain;
pub mod router;
mod runner;
pub mod scheduler;
pub mod snapshot;
pub mod stages;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    BatchId, BatchState, BusinessProjection, DegradationForecast, FraudAssessment, InputRecord,
    RecordId, RecordOutcome, RecordState, RiskLevel, StageError, StageKind, StagePayload,
    StageResult, ValidationFindings, Verdict,
};
pub use router::{pipeline_router, IngestRequest};
pub use scheduler::{BatchScheduler, SubmitError};
pub use snapshot::{BatchRollup, BatchSnapshot, ChartPoint, RecordView};
pub use stages::{
    standard_lineup, BusinessStage, DegradationStage, FraudStage, Stage, StageFailure,
    ValidationStage,
};
pub use store::{InMemoryJobStore, JobStore, StoreError};
