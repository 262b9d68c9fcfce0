use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};

use super::domain::{BatchId, BatchState, InputRecord, RecordId, RecordOutcome};
use super::snapshot::{BatchSnapshot, RecordView};

/// Error enumeration for job store failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("batch not found")]
    BatchNotFound,
    #[error("record not found in batch")]
    RecordNotFound,
    #[error("batch is already in a terminal state")]
    BatchTerminal,
    #[error("batch is not queued")]
    NotQueued,
    #[error("{0:?} is not a terminal batch state")]
    NotTerminal(BatchState),
    #[error("record state may not regress from {from:?} to {to:?}")]
    StateRegression {
        from: super::domain::RecordState,
        to: super::domain::RecordState,
    },
    #[error("stage results are append-only")]
    StageResultsRewritten,
}

/// The single source of truth for batch and record state. Implementations
/// must make every method atomic with respect to one record's outcome and
/// must serve snapshots no caller can observe mid-mutation.
pub trait JobStore: Send + Sync {
    /// Register a batch in `Queued` with one pending outcome per record.
    fn create_batch(&self, records: Vec<InputRecord>) -> Result<BatchId, StoreError>;

    /// Transition a queued batch to `Processing`.
    fn mark_processing(&self, batch_id: &BatchId) -> Result<(), StoreError>;

    /// Replace one record's outcome. Rejected when it would move the record
    /// backwards or rewrite stage results already published.
    fn update_record_outcome(
        &self,
        batch_id: &BatchId,
        outcome: RecordOutcome,
    ) -> Result<(), StoreError>;

    /// Move the batch into `Completed` or `Failed`, exactly once.
    fn mark_terminal(&self, batch_id: &BatchId, state: BatchState) -> Result<(), StoreError>;

    /// Consistent point-in-time view of the batch and all its records.
    fn snapshot(&self, batch_id: &BatchId) -> Result<BatchSnapshot, StoreError>;

    /// Number of batches currently retained, in-flight and completed.
    fn batch_count(&self) -> usize;
}

struct RecordSlot {
    input: InputRecord,
    outcome: Mutex<RecordOutcome>,
}

struct BatchEntry {
    created_at: DateTime<Utc>,
    /// Record writers hold this shared for the duration of their write, so
    /// the exclusive terminal transition cannot land mid-write and no
    /// outcome can mutate once the batch is terminal.
    state: RwLock<BatchState>,
    records: Vec<RecordSlot>,
}

impl BatchEntry {
    fn state(&self) -> RwLockReadGuard<'_, BatchState> {
        self.state.read().expect("batch state lock poisoned")
    }
}

/// In-memory store: a concurrent map of batches, one mutex per record
/// outcome so runners in the same batch never contend on each other's
/// writes. Completed batches are retained for the process lifetime.
#[derive(Default, Clone)]
pub struct InMemoryJobStore {
    batches: Arc<RwLock<HashMap<BatchId, Arc<BatchEntry>>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, batch_id: &BatchId) -> Result<Arc<BatchEntry>, StoreError> {
        let guard = self.batches.read().expect("store lock poisoned");
        guard
            .get(batch_id)
            .cloned()
            .ok_or(StoreError::BatchNotFound)
    }
}

impl JobStore for InMemoryJobStore {
    fn create_batch(&self, records: Vec<InputRecord>) -> Result<BatchId, StoreError> {
        let batch_id = BatchId::generate();
        let slots = records
            .into_iter()
            .enumerate()
            .map(|(index, input)| RecordSlot {
                input,
                outcome: Mutex::new(RecordOutcome::pending(RecordId::positional(index))),
            })
            .collect();
        let entry = Arc::new(BatchEntry {
            created_at: Utc::now(),
            state: RwLock::new(BatchState::Queued),
            records: slots,
        });

        let mut guard = self.batches.write().expect("store lock poisoned");
        guard.insert(batch_id.clone(), entry);
        Ok(batch_id)
    }

    fn mark_processing(&self, batch_id: &BatchId) -> Result<(), StoreError> {
        let entry = self.entry(batch_id)?;
        let mut state = entry.state.write().expect("batch state lock poisoned");
        match *state {
            BatchState::Queued => {
                *state = BatchState::Processing;
                Ok(())
            }
            BatchState::Processing => Ok(()),
            BatchState::Completed | BatchState::Failed => Err(StoreError::BatchTerminal),
        }
    }

    fn update_record_outcome(
        &self,
        batch_id: &BatchId,
        outcome: RecordOutcome,
    ) -> Result<(), StoreError> {
        let entry = self.entry(batch_id)?;
        // Held shared until the write lands; a concurrent terminal
        // transition needs the exclusive lock, so it either precedes this
        // check or waits for the write to finish.
        let state = entry.state();
        if state.is_terminal() {
            return Err(StoreError::BatchTerminal);
        }

        let slot = entry
            .records
            .iter()
            .find(|slot| {
                slot.outcome.lock().expect("record lock poisoned").record_id
                    == outcome.record_id
            })
            .ok_or(StoreError::RecordNotFound)?;

        let mut current = slot.outcome.lock().expect("record lock poisoned");
        if outcome.state.rank() < current.state.rank() {
            return Err(StoreError::StateRegression {
                from: current.state,
                to: outcome.state,
            });
        }
        if current.state.is_terminal() && outcome.state != current.state {
            return Err(StoreError::StateRegression {
                from: current.state,
                to: outcome.state,
            });
        }
        if outcome.stage_results.len() < current.stage_results.len()
            || outcome.stage_results[..current.stage_results.len()] != current.stage_results[..]
        {
            return Err(StoreError::StageResultsRewritten);
        }

        *current = outcome;
        Ok(())
    }

    fn mark_terminal(&self, batch_id: &BatchId, state: BatchState) -> Result<(), StoreError> {
        if !state.is_terminal() {
            return Err(StoreError::NotTerminal(state));
        }
        let entry = self.entry(batch_id)?;
        let mut current = entry.state.write().expect("batch state lock poisoned");
        if current.is_terminal() {
            return Err(StoreError::BatchTerminal);
        }
        *current = state;
        Ok(())
    }

    fn snapshot(&self, batch_id: &BatchId) -> Result<BatchSnapshot, StoreError> {
        let entry = self.entry(batch_id)?;
        // Batch state is read before the records: a terminal state implies
        // every record already reached its own terminal state, so the view
        // can never show a completed batch with unfinished records.
        let state = *entry.state();
        let records = entry
            .records
            .iter()
            .map(|slot| {
                let outcome = slot.outcome.lock().expect("record lock poisoned");
                RecordView::from_outcome(&slot.input, &outcome)
            })
            .collect();
        Ok(BatchSnapshot::assemble(
            batch_id.clone(),
            state,
            entry.created_at,
            records,
        ))
    }

    fn batch_count(&self) -> usize {
        self.batches.read().expect("store lock poisoned").len()
    }
}
