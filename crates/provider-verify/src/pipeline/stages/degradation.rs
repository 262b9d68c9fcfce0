use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};

use super::{Stage, StageFailure};
use crate::pipeline::domain::{
    DegradationForecast, InputRecord, StageKind, StagePayload, StageResult, Verdict,
};

/// Predicts how likely the record's data is to go stale: age since the
/// last update dominates, high-turnover specialties add a fixed increment.
pub struct DegradationStage {
    /// Reporting date override; tests anchor this, production uses today.
    anchor: Option<NaiveDate>,
}

impl Default for DegradationStage {
    fn default() -> Self {
        Self { anchor: None }
    }
}

impl DegradationStage {
    pub fn anchored(date: NaiveDate) -> Self {
        Self { anchor: Some(date) }
    }
}

const HIGH_TURNOVER_MARKERS: [&str; 3] = ["resident", "student", "locum"];

#[async_trait]
impl Stage for DegradationStage {
    fn kind(&self) -> StageKind {
        StageKind::Degradation
    }

    async fn run(
        &self,
        record: &InputRecord,
        _prior: &[StageResult],
    ) -> Result<StageResult, StageFailure> {
        let today = self.anchor.unwrap_or_else(|| Utc::now().date_naive());
        // Records with no update history are treated as a year old.
        let days_stale = record
            .last_updated
            .map(|date| (today - date).num_days().max(0))
            .unwrap_or(365);

        let mut decay_probability: f64 = 0.1;
        let mut factors = Vec::new();

        if days_stale > 90 {
            decay_probability += 0.4;
            factors.push("Data stale (>90 days)".to_string());
        } else if days_stale > 30 {
            decay_probability += 0.1;
        }

        let specialty = record.specialty.as_deref().unwrap_or("").to_lowercase();
        if HIGH_TURNOVER_MARKERS
            .iter()
            .any(|marker| specialty.contains(marker))
        {
            decay_probability += 0.3;
            factors.push("High turnover specialty".to_string());
        }
        let decay_probability = decay_probability.clamp(0.0, 1.0);

        let horizon_days = (30.0 * (1.0 - decay_probability)) as i64;
        let predicted_degradation_date = today.checked_add_signed(Duration::days(horizon_days));

        let verdict = if decay_probability > 0.7 {
            Verdict::Fail
        } else if decay_probability > 0.3 {
            Verdict::Warn
        } else {
            Verdict::Pass
        };

        Ok(StageResult {
            stage: StageKind::Degradation,
            verdict,
            summary: format!(
                "Decay probability {decay_probability:.2} ({days_stale} days since last update)"
            ),
            payload: StagePayload::Degradation(DegradationForecast {
                decay_probability,
                predicted_degradation_date,
                factors,
            }),
        })
    }
}
