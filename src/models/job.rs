use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

use crate::models::verification::VerificationStatusResponse;

/// Status of a verification job as reported by the API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum JobStatus {
    Pending,
    Processing,
    Approved,
    Rejected,
    Review,
    Error,
    Unknown,
}

impl JobStatus {
    /// Parse a server status string; anything unrecognised is `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.trim().parse().unwrap_or(JobStatus::Unknown)
    }

    /// Statuses that mean the backend is still working on the job.
    pub fn is_in_progress(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }
}

/// A verification job, as last observed by polling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationJob {
    pub id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extracted_fields: BTreeMap<String, serde_json::Value>,
    pub message: Option<String>,
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub explanations: Vec<serde_json::Value>,
    pub report_pdf_url: Option<String>,
}

impl VerificationJob {
    /// A freshly created job that has not been polled yet.
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            extracted_fields: BTreeMap::new(),
            message: None,
            score: None,
            explanations: Vec::new(),
            report_pdf_url: None,
        }
    }

    /// Fold a poll response into the job.
    ///
    /// Fields the response omits keep their previous value, so a result
    /// payload is not lost if a later read is sparse.
    pub fn apply(&mut self, response: VerificationStatusResponse) {
        self.status = JobStatus::parse_lenient(&response.status);
        if let Some(message) = response.message.or(response.reason) {
            self.message = Some(message);
        }
        if let Some(fields) = response.fields {
            self.extracted_fields = fields;
        }
        if response.score.is_some() {
            self.score = response.score;
        }
        if let Some(explanations) = response.explanations.filter(|e| !e.is_empty()) {
            self.explanations = explanations;
        }
        if response.report_pdf_url.is_some() {
            self.report_pdf_url = response.report_pdf_url;
        }
    }

    /// String value of an extracted field, if present and a string.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.extracted_fields.get(name).and_then(|value| value.as_str())
    }
}
