use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::PipelineConfig;

use super::domain::{BatchId, BatchState, InputRecord, RecordId};
use super::runner;
use super::stages::Stage;
use super::store::{JobStore, StoreError};

/// Synchronous rejection of a submission; no batch is created.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("batch contains no records")]
    EmptyBatch,
    #[error("batch of {got} records exceeds the configured maximum of {limit}")]
    BatchTooLarge { got: usize, limit: usize },
    #[error("record {index} is malformed: {reason}")]
    MalformedRecord { index: usize, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a spawned runner could not do its work. Store faults and a closed
/// concurrency gate are orchestration failures; they fail the whole batch.
#[derive(Debug, thiserror::Error)]
enum RunnerFault {
    #[error("concurrency gate closed before the record could start")]
    GateClosed,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Accepts batches, fans out one runner per record under a bounded
/// concurrency limit, and drives each batch to exactly one terminal state.
pub struct BatchScheduler<S> {
    store: Arc<S>,
    stages: Arc<[Arc<dyn Stage>]>,
    config: PipelineConfig,
    /// Optional cap across all batches, on top of the per-batch bound.
    global_slots: Option<Arc<Semaphore>>,
}

impl<S> BatchScheduler<S>
where
    S: JobStore + 'static,
{
    pub fn new(store: Arc<S>, stages: Vec<Arc<dyn Stage>>, config: PipelineConfig) -> Self {
        let global_slots = config
            .global_max_concurrent
            .map(|limit| Arc::new(Semaphore::new(limit)));
        Self {
            store,
            stages: stages.into(),
            config,
            global_slots,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validate and register a batch, then fan out its runners. Returns as
    /// soon as the batch id exists; completion is observed by polling.
    ///
    /// Must be called within a tokio runtime.
    pub fn submit(&self, records: Vec<InputRecord>) -> Result<BatchId, SubmitError> {
        if records.is_empty() {
            return Err(SubmitError::EmptyBatch);
        }
        if records.len() > self.config.max_batch_size {
            return Err(SubmitError::BatchTooLarge {
                got: records.len(),
                limit: self.config.max_batch_size,
            });
        }
        for (index, record) in records.iter().enumerate() {
            validate_shape(index, record)?;
        }

        let total = records.len();
        let batch_id = self.store.create_batch(records.clone())?;
        self.store.mark_processing(&batch_id)?;
        info!(%batch_id, total, "batch accepted");

        let batch_slots = Arc::new(Semaphore::new(self.config.max_concurrent_records));
        let completed = Arc::new(AtomicUsize::new(0));

        for (index, input) in records.into_iter().enumerate() {
            let store = Arc::clone(&self.store);
            let stages = Arc::clone(&self.stages);
            let batch_slots = Arc::clone(&batch_slots);
            let global_slots = self.global_slots.clone();
            let completed = Arc::clone(&completed);
            let batch_id = batch_id.clone();
            let stage_timeout = self.config.stage_timeout;

            tokio::spawn(async move {
                let run = drive_record(
                    store.as_ref(),
                    &batch_id,
                    RecordId::positional(index),
                    input,
                    &stages,
                    batch_slots,
                    global_slots,
                    stage_timeout,
                )
                .await;

                match run {
                    Ok(()) => {
                        // Terminal transition is decided by this counter, not
                        // by re-reading record states, so it fires exactly once.
                        let finished = completed.fetch_add(1, Ordering::AcqRel) + 1;
                        if finished == total {
                            finish_batch(store.as_ref(), &batch_id, BatchState::Completed);
                        }
                    }
                    Err(fault) => {
                        error!(%batch_id, %fault, "orchestration fault while processing record");
                        finish_batch(store.as_ref(), &batch_id, BatchState::Failed);
                    }
                }
            });
        }

        Ok(batch_id)
    }
}

fn validate_shape(index: usize, record: &InputRecord) -> Result<(), SubmitError> {
    if record.npi.trim().is_empty() {
        return Err(SubmitError::MalformedRecord {
            index,
            reason: "missing NPI".to_string(),
        });
    }
    if record.name.trim().is_empty() {
        return Err(SubmitError::MalformedRecord {
            index,
            reason: "missing provider name".to_string(),
        });
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn drive_record<S>(
    store: &S,
    batch_id: &BatchId,
    record_id: RecordId,
    input: InputRecord,
    stages: &[Arc<dyn Stage>],
    batch_slots: Arc<Semaphore>,
    global_slots: Option<Arc<Semaphore>>,
    stage_timeout: Duration,
) -> Result<(), RunnerFault>
where
    S: JobStore + ?Sized,
{
    // Records queue here while the batch's bound is saturated; they stay
    // Pending until a slot frees up.
    let _batch_permit = batch_slots
        .acquire()
        .await
        .map_err(|_| RunnerFault::GateClosed)?;
    let _global_permit = match &global_slots {
        Some(slots) => Some(slots.acquire().await.map_err(|_| RunnerFault::GateClosed)?),
        None => None,
    };

    runner::run_record(store, batch_id, record_id, input, stages, stage_timeout).await?;
    Ok(())
}

fn finish_batch<S>(store: &S, batch_id: &BatchId, state: BatchState)
where
    S: JobStore + ?Sized,
{
    match store.mark_terminal(batch_id, state) {
        Ok(()) => info!(%batch_id, ?state, "batch reached terminal state"),
        // Another runner already finished the batch; terminal states are
        // written exactly once.
        Err(StoreError::BatchTerminal) => {}
        Err(err) => error!(%batch_id, %err, "failed to finalize batch"),
    }
}
