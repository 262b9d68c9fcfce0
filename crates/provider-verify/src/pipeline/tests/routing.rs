use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::pipeline::router::pipeline_router;
use crate::pipeline::store::JobStore;
use crate::pipeline::stages::standard_lineup;

fn post_ingest(body: Value) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::post("/ingest")
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(
            serde_json::to_vec(&body).expect("serializable"),
        ))
        .expect("request builds")
}

fn get_status(job_id: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::get(format!("/status/{job_id}"))
        .body(axum::body::Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn ingest_then_poll_to_completion() {
    let (scheduler, _store) = scheduler_with_stages(standard_lineup(), quick_config(4));
    let router = pipeline_router(scheduler);

    let body = json!({
        "records": [
            { "npi": "9912345678", "name": "Jordan Avery", "specialty": "Cardiology" },
            { "npi": "9912345679", "name": "Sam Okafor" },
            { "npi": "9912345680", "name": "Riley Chen" }
        ]
    });
    let response = router
        .clone()
        .oneshot(post_ingest(body))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    let job_id = payload["job_id"].as_str().expect("job id issued").to_string();

    let mut last = Value::Null;
    for _ in 0..2_000 {
        let response = router
            .clone()
            .oneshot(get_status(&job_id))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        last = read_json_body(response).await;
        if last["status"] == "completed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(last["status"], "completed");
    assert_eq!(last["job_id"], job_id.as_str());
    assert_eq!(last["rollup"]["providersProcessed"], 3);
    assert_eq!(last["rollup"]["discrepanciesFound"], 0);
    let records = last["records"].as_array().expect("records present");
    assert!(records.iter().all(|record| record["state"] == "done"));
}

#[tokio::test]
async fn empty_submissions_get_a_validation_error_and_no_job_id() {
    let (scheduler, store) = scheduler_with_stages(stub_lineup(), quick_config(4));
    let router = pipeline_router(scheduler);

    let response = router
        .oneshot(post_ingest(json!({ "records": [] })))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload.get("job_id").is_none());
    assert!(payload["error"]
        .as_str()
        .expect("error message")
        .contains("no records"));
    assert_eq!(store.batch_count(), 0);
}

#[tokio::test]
async fn unknown_job_ids_return_not_found() {
    let (scheduler, _store) = scheduler_with_stages(stub_lineup(), quick_config(4));
    let router = pipeline_router(scheduler);

    let response = router
        .oneshot(get_status("no-such-job"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "job not found");
}

#[tokio::test]
async fn roster_csv_payloads_are_ingested() {
    let (scheduler, store) = scheduler_with_stages(stub_lineup(), quick_config(4));
    let router = pipeline_router(scheduler);

    let csv = "Name,NPI,Specialty\nJordan Avery,9912345678,Cardiology\nSam Okafor,9912345679,\n";
    let response = router
        .clone()
        .oneshot(post_ingest(json!({ "roster_csv": csv })))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    let job_id = payload["job_id"].as_str().expect("job id issued");

    let response = router
        .oneshot(get_status(job_id))
        .await
        .expect("route executes");
    let snapshot = read_json_body(response).await;
    assert_eq!(snapshot["totalRecords"], 2);
    assert_eq!(store.batch_count(), 1);
}

#[tokio::test]
async fn malformed_roster_csv_is_rejected() {
    let (scheduler, store) = scheduler_with_stages(stub_lineup(), quick_config(4));
    let router = pipeline_router(scheduler);

    let response = router
        .oneshot(post_ingest(json!({ "roster_csv": "Name,NPI\nJordan Avery,\n" })))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(store.batch_count(), 0);
}

#[tokio::test]
async fn processing_snapshots_expose_partial_progress() {
    use std::sync::Arc;
    use crate::pipeline::stages::Stage;

    let gated = Arc::new(GatedStage::new());
    let gate = Arc::clone(&gated.gate);
    let stages: Vec<Arc<dyn Stage>> = vec![gated];
    let (scheduler, _store) = scheduler_with_stages(stages, quick_config(1));
    let router = pipeline_router(scheduler);

    let body = json!({
        "records": [
            { "npi": "9912345678", "name": "Jordan Avery" },
            { "npi": "9912345679", "name": "Sam Okafor" }
        ]
    });
    let response = router
        .clone()
        .oneshot(post_ingest(body))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    let job_id = payload["job_id"].as_str().expect("job id issued").to_string();

    // With a single slot and a held gate, the batch is observably mid-flight.
    let mut saw_processing = false;
    for _ in 0..2_000 {
        let response = router
            .clone()
            .oneshot(get_status(&job_id))
            .await
            .expect("route executes");
        let snapshot = read_json_body(response).await;
        if snapshot["status"] == "processing"
            && snapshot["records"]
                .as_array()
                .expect("records present")
                .iter()
                .any(|record| record["state"] == "running")
        {
            assert!(snapshot.get("rollup").is_none(), "no rollup before completion");
            saw_processing = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert!(saw_processing);

    gate.add_permits(8);
    for _ in 0..2_000 {
        let response = router
            .clone()
            .oneshot(get_status(&job_id))
            .await
            .expect("route executes");
        let snapshot = read_json_body(response).await;
        if snapshot["status"] == "completed" {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("batch never completed after releasing the gate");
}
