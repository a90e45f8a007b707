use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use strum::Display;

use crate::models::job::JobStatus;

/// Where a workflow run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Selecting,
    Presigning,
    Uploading,
    CreatingJob,
    Polling,
    Terminal(JobStatus),
    TimedOut,
    Failed,
    Cancelled,
}

impl WorkflowState {
    /// True once the run will make no further progress.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            WorkflowState::Terminal(_)
                | WorkflowState::TimedOut
                | WorkflowState::Failed
                | WorkflowState::Cancelled
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Idle => f.write_str("idle"),
            WorkflowState::Selecting => f.write_str("selecting"),
            WorkflowState::Presigning => f.write_str("presigning"),
            WorkflowState::Uploading => f.write_str("uploading"),
            WorkflowState::CreatingJob => f.write_str("creating_job"),
            WorkflowState::Polling => f.write_str("polling"),
            WorkflowState::Terminal(status) => write!(f, "terminal({status})"),
            WorkflowState::TimedOut => f.write_str("timed_out"),
            WorkflowState::Failed => f.write_str("failed"),
            WorkflowState::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One line of workflow progress.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowLogEntry {
    /// Position in the run's log, starting at 0.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// State the run was in when the line was written.
    pub state: WorkflowState,
    pub message: String,
}

impl fmt::Display for WorkflowLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S%.3f"), self.message)
    }
}
