use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use clap::Args;
use provider_verify::config::PipelineConfig;
use provider_verify::error::AppError;
use provider_verify::pipeline::{BatchSnapshot, InputRecord, JobStore, RecordState, RecordView};
use provider_verify::roster::parse_roster;

use crate::infra::build_scheduler;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Submit records from a roster CSV instead of the built-in sample batch.
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
    /// Milliseconds between status polls.
    #[arg(long, default_value_t = 100)]
    pub(crate) poll_interval_ms: u64,
}

#[derive(Args, Debug)]
pub(crate) struct RosterCheckArgs {
    /// Path to the roster CSV export
    pub(crate) path: PathBuf,
}

pub(crate) fn run_roster_check(args: RosterCheckArgs) -> Result<(), AppError> {
    let file = File::open(&args.path)?;
    let records = parse_roster(file)?;

    println!("Roster {} parsed cleanly", args.path.display());
    println!("- {} providers ready for submission", records.len());
    for record in &records {
        println!(
            "  - {} (NPI {}) | specialty: {} | last updated: {}",
            record.name,
            record.npi,
            record.specialty.as_deref().unwrap_or("unspecified"),
            record
                .last_updated
                .map(|date| date.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        );
    }

    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        roster,
        poll_interval_ms,
    } = args;

    let records = match roster {
        Some(path) => {
            let file = File::open(&path)?;
            let records = parse_roster(file)?;
            println!("Submitting {} providers from {}", records.len(), path.display());
            records
        }
        None => {
            let records = sample_batch();
            println!("Submitting {} sample providers", records.len());
            records
        }
    };

    let (scheduler, store) = build_scheduler(PipelineConfig::default());
    let batch_id = scheduler.submit(records)?;
    println!("Accepted as job {batch_id}");

    let snapshot = loop {
        let snapshot = match store.snapshot(&batch_id) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                println!("  Status unavailable: {}", err);
                return Ok(());
            }
        };
        println!(
            "  {} | {}/{} done | {} running | {} errored",
            snapshot.state.label(),
            snapshot.records_done,
            snapshot.total_records,
            snapshot.records_running(),
            snapshot.records_errored,
        );
        if snapshot.state.is_terminal() {
            break snapshot;
        }
        tokio::time::sleep(Duration::from_millis(poll_interval_ms)).await;
    };

    render_outcomes(&snapshot);
    Ok(())
}

fn render_outcomes(snapshot: &BatchSnapshot) {
    println!("\nRecord outcomes");
    for view in &snapshot.records {
        render_record(view);
    }

    if let Some(rollup) = &snapshot.rollup {
        println!("\n{}", rollup.summary);
        println!(
            "- {} discrepancies | avg risk {:.0} | estimated savings ${:.0}",
            rollup.discrepancies_found, rollup.average_risk_score, rollup.estimated_savings
        );
        println!("Risk distribution:");
        for point in &rollup.risk_distribution {
            println!("  - {}: {:.0}", point.name, point.value);
        }
    } else {
        println!(
            "\nBatch ended without a rollup (terminal state: {})",
            snapshot.state.label()
        );
    }
}

fn render_record(view: &RecordView) {
    println!("- {} {} ({:?})", view.record_id, view.name, view.state);
    for result in &view.stage_results {
        println!("    {} -> {:?}: {}", result.stage, result.verdict, result.summary);
    }
    if view.state == RecordState::Errored {
        if let Some(error) = &view.error {
            println!("    {} failed: {}", error.stage, error.reason);
        }
    }
}

/// Three providers chosen to exercise each analysis path: a clean record,
/// a registry name conflict, and an OIG exclusion.
fn sample_batch() -> Vec<InputRecord> {
    let today = Utc::now().date_naive();
    vec![
        InputRecord {
            npi: "9912345678".to_string(),
            name: "Jordan Avery".to_string(),
            specialty: Some("Cardiology".to_string()),
            last_updated: Some(today - ChronoDuration::days(10)),
            document_ref: None,
        },
        InputRecord {
            npi: "8812345678".to_string(),
            name: "Sam Okafor".to_string(),
            specialty: Some("Locum Tenens".to_string()),
            last_updated: Some(today - ChronoDuration::days(120)),
            document_ref: None,
        },
        InputRecord {
            npi: "1112345678".to_string(),
            name: "Riley Chen".to_string(),
            specialty: None,
            last_updated: None,
            document_ref: None,
        },
    ]
}
