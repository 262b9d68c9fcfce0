use async_trait::async_trait;

use super::{degradation_forecast, fraud_assessment, Stage, StageFailure};
use crate::pipeline::domain::{
    BusinessProjection, InputRecord, RiskLevel, StageKind, StagePayload, StageResult, Verdict,
};

/// Estimates the dollar impact of keeping this record current. A verified
/// low-risk record prevents roughly $300/year in claim denials; the
/// degradation forecast discounts that figure.
pub struct BusinessStage;

const ANNUAL_SAVINGS_PER_VERIFIED: f64 = 300.0;
const ROI_MULTIPLIER: f64 = 3.5;

#[async_trait]
impl Stage for BusinessStage {
    fn kind(&self) -> StageKind {
        StageKind::Business
    }

    async fn run(
        &self,
        _record: &InputRecord,
        prior: &[StageResult],
    ) -> Result<StageResult, StageFailure> {
        let fraud = fraud_assessment(prior)
            .ok_or_else(|| StageFailure::new("business impact requires a fraud assessment"))?;
        let forecast = degradation_forecast(prior)
            .ok_or_else(|| StageFailure::new("business impact requires a degradation forecast"))?;

        let base_savings = match fraud.risk_level {
            RiskLevel::Low => ANNUAL_SAVINGS_PER_VERIFIED,
            RiskLevel::Medium => ANNUAL_SAVINGS_PER_VERIFIED / 2.0,
            RiskLevel::High => 0.0,
        };
        let estimated_savings = base_savings * (1.0 - forecast.decay_probability / 2.0);
        let roi_multiplier = if estimated_savings > 0.0 {
            ROI_MULTIPLIER
        } else {
            0.0
        };

        let (verdict, notes) = match fraud.risk_level {
            RiskLevel::High => (
                Verdict::Warn,
                "High fraud risk: exclude from network projections pending review".to_string(),
            ),
            _ => (
                Verdict::Pass,
                format!("Prevented claim denials worth ~${estimated_savings:.0}/year"),
            ),
        };

        Ok(StageResult {
            stage: StageKind::Business,
            verdict,
            summary: format!("Estimated savings ${estimated_savings:.0}/year"),
            payload: StagePayload::Business(BusinessProjection {
                estimated_savings,
                roi_multiplier,
                notes,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::domain::{DegradationForecast, FraudAssessment};

    fn record() -> InputRecord {
        InputRecord {
            npi: "9912345678".to_string(),
            name: "Jordan Avery".to_string(),
            specialty: None,
            last_updated: None,
            document_ref: None,
        }
    }

    fn prior(level: RiskLevel, decay_probability: f64) -> Vec<StageResult> {
        vec![
            StageResult {
                stage: StageKind::Fraud,
                verdict: Verdict::Pass,
                summary: String::new(),
                payload: StagePayload::Fraud(FraudAssessment {
                    risk_score: 0.0,
                    risk_level: level,
                    flagged_patterns: Vec::new(),
                }),
            },
            StageResult {
                stage: StageKind::Degradation,
                verdict: Verdict::Pass,
                summary: String::new(),
                payload: StagePayload::Degradation(DegradationForecast {
                    decay_probability,
                    predicted_degradation_date: None,
                    factors: Vec::new(),
                }),
            },
        ]
    }

    #[tokio::test]
    async fn low_risk_fresh_record_earns_full_savings() {
        let result = BusinessStage
            .run(&record(), &prior(RiskLevel::Low, 0.0))
            .await
            .expect("projects");
        match result.payload {
            StagePayload::Business(projection) => {
                assert_eq!(projection.estimated_savings, 300.0);
                assert_eq!(projection.roi_multiplier, 3.5);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn high_risk_record_earns_nothing_and_warns() {
        let result = BusinessStage
            .run(&record(), &prior(RiskLevel::High, 0.2))
            .await
            .expect("projects");
        assert_eq!(result.verdict, Verdict::Warn);
        match result.payload {
            StagePayload::Business(projection) => {
                assert_eq!(projection.estimated_savings, 0.0);
                assert_eq!(projection.roi_multiplier, 0.0);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn decay_probability_discounts_savings() {
        let result = BusinessStage
            .run(&record(), &prior(RiskLevel::Low, 0.5))
            .await
            .expect("projects");
        match result.payload {
            StagePayload::Business(projection) => {
                assert_eq!(projection.estimated_savings, 225.0);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_upstream_results_is_a_stage_failure() {
        let failure = BusinessStage
            .run(&record(), &[])
            .await
            .expect_err("dependency missing");
        assert!(failure.reason.contains("fraud assessment"));
    }
}
