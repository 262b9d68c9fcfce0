use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use provider_verify::config::PipelineConfig;
use provider_verify::pipeline::{standard_lineup, BatchScheduler, InMemoryJobStore};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wire the in-memory store to a scheduler running the production stage
/// lineup.
pub(crate) fn build_scheduler(
    config: PipelineConfig,
) -> (Arc<BatchScheduler<InMemoryJobStore>>, Arc<InMemoryJobStore>) {
    let store = Arc::new(InMemoryJobStore::new());
    let scheduler = Arc::new(BatchScheduler::new(
        Arc::clone(&store),
        standard_lineup(),
        config,
    ));
    (scheduler, store)
}
