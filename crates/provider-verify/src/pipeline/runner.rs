use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use super::domain::{
    BatchId, InputRecord, RecordId, RecordOutcome, RecordState, StageError,
};
use super::stages::Stage;
use super::store::{JobStore, StoreError};

/// Drives one record through the stage lineup in order, publishing each
/// transition to the store. Always leaves the record terminal: `Done` when
/// every stage succeeded, `Errored` at the first stage failure or timeout
/// (later stages are skipped, their inputs would be missing).
///
/// Returns `Err` only for store-level faults, which the scheduler treats
/// as an orchestration failure rather than a record outcome.
pub(crate) async fn run_record<S>(
    store: &S,
    batch_id: &BatchId,
    record_id: RecordId,
    input: InputRecord,
    stages: &[Arc<dyn Stage>],
    stage_timeout: Duration,
) -> Result<(), StoreError>
where
    S: JobStore + ?Sized,
{
    let mut outcome = RecordOutcome {
        record_id,
        state: RecordState::Running,
        stage_results: Vec::with_capacity(stages.len()),
        error: None,
    };
    store.update_record_outcome(batch_id, outcome.clone())?;

    for stage in stages {
        let kind = stage.kind();
        let attempt = timeout(stage_timeout, stage.run(&input, &outcome.stage_results)).await;
        let failure_reason = match attempt {
            Ok(Ok(result)) => {
                debug!(%batch_id, record = %outcome.record_id, stage = %kind, verdict = ?result.verdict, "stage finished");
                outcome.stage_results.push(result);
                store.update_record_outcome(batch_id, outcome.clone())?;
                continue;
            }
            Ok(Err(failure)) => failure.reason,
            Err(_elapsed) => format!("stage timed out after {}ms", stage_timeout.as_millis()),
        };

        warn!(%batch_id, record = %outcome.record_id, stage = %kind, reason = %failure_reason, "stage failed; skipping remaining stages");
        outcome.state = RecordState::Errored;
        outcome.error = Some(StageError {
            stage: kind,
            reason: failure_reason,
        });
        store.update_record_outcome(batch_id, outcome)?;
        return Ok(());
    }

    outcome.state = RecordState::Done;
    store.update_record_outcome(batch_id, outcome)?;
    Ok(())
}
