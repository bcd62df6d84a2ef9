use chrono::{DateTime, Local};
use serde::Serialize;

use super::classifier::{Classification, Decision, OperatingThreshold, Probability};
use super::record::SubmissionId;

const DISPLAY_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Outcome of one pipeline run. Never mutated after creation; the cache hands out clones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub probability: Probability,
    pub decision: Decision,
    pub severity: &'static str,
    pub interpretation: &'static str,
    pub threshold: f64,
    pub created_at: DateTime<Local>,
}

impl ClassificationResult {
    pub fn new(
        probability: Probability,
        threshold: OperatingThreshold,
        classification: Classification,
    ) -> Self {
        Self {
            probability,
            decision: classification.decision,
            severity: classification.severity,
            interpretation: classification.interpretation,
            threshold: threshold.value(),
            created_at: Local::now(),
        }
    }

    pub fn display_timestamp(&self) -> String {
        self.created_at.format(DISPLAY_TIMESTAMP_FORMAT).to_string()
    }

    pub fn view(&self, submission_id: &SubmissionId, result_url: String) -> ResultView {
        ResultView {
            submission_id: submission_id.clone(),
            probability: self.probability.value(),
            decision: self.decision,
            decision_label: self.decision.label(),
            severity: self.severity,
            interpretation: self.interpretation,
            threshold: self.threshold,
            generated_at: self.display_timestamp(),
            result_url,
        }
    }
}

/// Response payload handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub submission_id: SubmissionId,
    pub probability: f64,
    pub decision: Decision,
    pub decision_label: &'static str,
    pub severity: &'static str,
    pub interpretation: &'static str,
    pub threshold: f64,
    pub generated_at: String,
    pub result_url: String,
}
