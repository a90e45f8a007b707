use garde::Validate;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::document::{DocumentField, DocumentType};
use crate::models::job::JobStatus;
use crate::models::verification::UserFields;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Verification API base URL (e.g., "https://kyc-api.example.com")
    pub api_base_url: String,

    /// Delay between job status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Polls to issue before giving up with a timeout
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Comma-separated slots that must have a file (front, back, selfie)
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,

    /// Comma-separated statuses that end polling
    #[serde(default = "default_terminal_statuses")]
    pub terminal_statuses: Vec<String>,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// passport, driver_license or aadhaar_offline
    #[serde(default)]
    pub document_type: Option<String>,

    pub front_image: Option<PathBuf>,
    pub back_image: Option<PathBuf>,
    pub selfie_image: Option<PathBuf>,

    pub full_name: Option<String>,

    /// Date of birth, YYYY-MM-DD
    pub dob: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_poll_attempts() -> u32 {
    30
}

fn default_required_fields() -> Vec<String> {
    vec!["front".to_string(), "selfie".to_string()]
}

fn default_terminal_statuses() -> Vec<String> {
    ["approved", "rejected", "review", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Build and validate the polling/selection rules for a workflow run.
    pub fn workflow_config(&self) -> Result<WorkflowConfig, ConfigError> {
        let required_fields = self
            .required_fields
            .iter()
            .filter_map(|raw| non_blank(raw))
            .map(|raw| {
                raw.parse::<DocumentField>()
                    .map_err(|_| ConfigError::UnknownField(raw.to_string()))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        let terminal_statuses = self
            .terminal_statuses
            .iter()
            .filter_map(|raw| non_blank(raw))
            .map(|raw| {
                raw.parse::<JobStatus>()
                    .map_err(|_| ConfigError::UnknownStatus(raw.to_string()))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        let config = WorkflowConfig {
            poll_interval_ms: self.poll_interval_ms,
            max_poll_attempts: self.max_poll_attempts,
            required_fields,
            terminal_statuses,
        };
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    pub fn document_type(&self) -> Result<DocumentType, ConfigError> {
        match self.document_type.as_deref().and_then(non_blank) {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::UnknownDocumentType(raw.to_string())),
            None => Ok(DocumentType::default()),
        }
    }

    pub fn user_fields(&self) -> UserFields {
        UserFields {
            name: self.full_name.as_deref().and_then(non_blank).map(str::to_string),
            dob: self.dob.as_deref().and_then(non_blank).map(str::to_string),
        }
    }

    /// Image paths configured for each slot.
    pub fn image_paths(&self) -> Vec<(DocumentField, PathBuf)> {
        [
            (DocumentField::Front, &self.front_image),
            (DocumentField::Back, &self.back_image),
            (DocumentField::Selfie, &self.selfie_image),
        ]
        .into_iter()
        .filter_map(|(field, path)| path.clone().map(|p| (field, p)))
        .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn non_blank(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Rules a single upload-and-poll run follows.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct WorkflowConfig {
    #[garde(range(min = 1, max = 600_000))]
    pub poll_interval_ms: u64,

    #[garde(range(min = 1, max = 10_000))]
    pub max_poll_attempts: u32,

    #[garde(custom(validate_required_fields))]
    pub required_fields: BTreeSet<DocumentField>,

    #[garde(custom(validate_terminal_statuses))]
    pub terminal_statuses: BTreeSet<JobStatus>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            required_fields: [DocumentField::Front, DocumentField::Selfie].into(),
            terminal_statuses: [
                JobStatus::Approved,
                JobStatus::Rejected,
                JobStatus::Review,
                JobStatus::Error,
            ]
            .into(),
        }
    }
}

impl WorkflowConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn is_terminal(&self, status: JobStatus) -> bool {
        self.terminal_statuses.contains(&status)
    }
}

fn validate_required_fields(value: &BTreeSet<DocumentField>, _ctx: &()) -> garde::Result {
    if value.is_empty() {
        return Err(garde::Error::new("at least one required field"));
    }
    Ok(())
}

fn validate_terminal_statuses(value: &BTreeSet<JobStatus>, _ctx: &()) -> garde::Result {
    if value.is_empty() {
        return Err(garde::Error::new("at least one terminal status"));
    }
    if let Some(status) = value.iter().find(|status| status.is_in_progress()) {
        return Err(garde::Error::new(format!("{status} cannot be terminal")));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment configuration error: {0}")]
    Env(#[from] envy::Error),

    #[error("Unknown document field: {0}")]
    UnknownField(String),

    #[error("Unknown job status: {0}")]
    UnknownStatus(String),

    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error("Invalid workflow configuration: {0}")]
    Invalid(garde::Report),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Result<AppConfig, envy::Error> {
        envy::from_iter(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_defaults() {
        let config = env(&[("API_BASE_URL", "http://localhost:8000")]).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.document_type().unwrap(), DocumentType::Passport);
        assert!(config.image_paths().is_empty());

        let workflow = config.workflow_config().unwrap();
        assert_eq!(workflow, WorkflowConfig::default());
        assert_eq!(workflow.poll_interval(), Duration::from_millis(2000));
    }

    #[test]
    fn test_comma_separated_lists() {
        let config = env(&[
            ("API_BASE_URL", "http://localhost:8000"),
            ("REQUIRED_FIELDS", "front, back,selfie"),
            ("TERMINAL_STATUSES", "approved,rejected"),
            ("MAX_POLL_ATTEMPTS", "120"),
            ("POLL_INTERVAL_MS", "1500"),
            ("DOCUMENT_TYPE", "aadhaar_offline"),
            ("SELFIE_IMAGE", "/tmp/selfie.jpg"),
        ])
        .unwrap();

        let workflow = config.workflow_config().unwrap();
        assert_eq!(workflow.required_fields.len(), 3);
        assert!(workflow.is_terminal(JobStatus::Rejected));
        assert!(!workflow.is_terminal(JobStatus::Review));
        assert_eq!(workflow.max_poll_attempts, 120);
        assert_eq!(config.document_type().unwrap(), DocumentType::AadhaarOffline);
        assert_eq!(
            config.image_paths(),
            vec![(DocumentField::Selfie, PathBuf::from("/tmp/selfie.jpg"))]
        );
    }

    #[test]
    fn test_rejects_unknown_names() {
        let config = env(&[
            ("API_BASE_URL", "http://localhost:8000"),
            ("REQUIRED_FIELDS", "front,passport_photo"),
        ])
        .unwrap();
        assert!(matches!(
            config.workflow_config(),
            Err(ConfigError::UnknownField(name)) if name == "passport_photo"
        ));

        let config = env(&[
            ("API_BASE_URL", "http://localhost:8000"),
            ("DOCUMENT_TYPE", "library_card"),
        ])
        .unwrap();
        assert!(config.document_type().is_err());
    }

    #[test]
    fn test_in_progress_status_cannot_be_terminal() {
        let config = WorkflowConfig {
            terminal_statuses: [JobStatus::Approved, JobStatus::Pending].into(),
            ..WorkflowConfig::default()
        };
        assert!(config.validate().is_err());

        let config = WorkflowConfig {
            max_poll_attempts: 0,
            ..WorkflowConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_base_url_is_an_error() {
        assert!(env(&[("POLL_INTERVAL_MS", "10")]).is_err());
    }
}
