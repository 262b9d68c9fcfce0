use async_trait::async_trait;

use super::{validation_findings, Stage, StageFailure};
use crate::pipeline::domain::{
    FraudAssessment, InputRecord, RiskLevel, StageKind, StagePayload, StageResult, Verdict,
};

/// Scores fraud risk from the validation findings. An OIG exclusion or an
/// invalid NPI dominates the score; registry conflicts add smaller
/// increments.
pub struct FraudStage;

#[async_trait]
impl Stage for FraudStage {
    fn kind(&self) -> StageKind {
        StageKind::Fraud
    }

    async fn run(
        &self,
        _record: &InputRecord,
        prior: &[StageResult],
    ) -> Result<StageResult, StageFailure> {
        // The fixed stage order exists for this dependency: scoring is
        // meaningless without a resolved identity.
        let findings = validation_findings(prior)
            .ok_or_else(|| StageFailure::new("fraud scoring requires validation findings"))?;

        let mut risk_score = 0.0;
        let mut flagged_patterns = Vec::new();

        if findings.oig_excluded {
            risk_score += 90.0;
            flagged_patterns.push("OIG exclusion match".to_string());
        }
        if !findings.npi_valid {
            risk_score += 50.0;
            flagged_patterns.push("Invalid NPI".to_string());
        }
        if !findings.conflicts.is_empty() {
            risk_score += 10.0 * findings.conflicts.len() as f64;
            flagged_patterns.push("Registry data conflicts".to_string());
        }
        let risk_score = risk_score.min(100.0);

        let risk_level = if risk_score > 80.0 {
            RiskLevel::High
        } else if risk_score > 40.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let verdict = match risk_level {
            RiskLevel::High => Verdict::Fail,
            RiskLevel::Medium => Verdict::Warn,
            RiskLevel::Low => Verdict::Pass,
        };

        let summary = format!(
            "Risk score {risk_score:.0}/100 ({} flagged pattern(s))",
            flagged_patterns.len()
        );

        Ok(StageResult {
            stage: StageKind::Fraud,
            verdict,
            summary,
            payload: StagePayload::Fraud(FraudAssessment {
                risk_score,
                risk_level,
                flagged_patterns,
            }),
        })
    }
}
