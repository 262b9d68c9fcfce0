use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::roster;

use super::domain::{BatchId, InputRecord};
use super::scheduler::{BatchScheduler, SubmitError};
use super::store::{JobStore, StoreError};

/// Ingestion body: inline records, a roster CSV payload, or both. CSV rows
/// are appended after the inline records.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub records: Vec<InputRecord>,
    #[serde(default)]
    pub roster_csv: Option<String>,
}

/// Router builder exposing the submit/poll contract. Everything outside
/// the pipeline consumes only these two endpoints.
pub fn pipeline_router<S>(scheduler: Arc<BatchScheduler<S>>) -> Router
where
    S: JobStore + 'static,
{
    Router::new()
        .route("/ingest", post(ingest_handler::<S>))
        .route("/status/:job_id", get(status_handler::<S>))
        .with_state(scheduler)
}

pub(crate) async fn ingest_handler<S>(
    State(scheduler): State<Arc<BatchScheduler<S>>>,
    Json(request): Json<IngestRequest>,
) -> Response
where
    S: JobStore + 'static,
{
    let mut records = request.records;
    if let Some(csv_text) = request.roster_csv {
        match roster::parse_roster(csv_text.as_bytes()) {
            Ok(mut imported) => records.append(&mut imported),
            Err(error) => {
                let payload = json!({ "error": error.to_string() });
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
            }
        }
    }

    match scheduler.submit(records) {
        Ok(batch_id) => {
            let payload = json!({ "job_id": batch_id });
            (StatusCode::ACCEPTED, Json(payload)).into_response()
        }
        Err(
            error @ (SubmitError::EmptyBatch
            | SubmitError::BatchTooLarge { .. }
            | SubmitError::MalformedRecord { .. }),
        ) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn status_handler<S>(
    State(scheduler): State<Arc<BatchScheduler<S>>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: JobStore + 'static,
{
    let batch_id = BatchId(job_id);
    match scheduler.store().snapshot(&batch_id) {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(StoreError::BatchNotFound) => {
            let payload = json!({ "error": "job not found" });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
