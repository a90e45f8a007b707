//! Upload-and-poll verification workflow.
//!
//! A run walks `Selecting → Presigning → Uploading → CreatingJob → Polling`
//! and ends in a terminal job status, a timeout, a failure or a
//! cancellation. Every transition is appended to the run's log, which the
//! caller can follow live through [`WorkflowHandle::next_log`].

use chrono::Utc;
use garde::Validate;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::models::document::{DocumentField, DocumentType, SelectedFiles, UploadTarget};
use crate::models::job::{JobStatus, VerificationJob};
use crate::models::log::{LogLevel, WorkflowLogEntry, WorkflowState};
use crate::models::verification::{CreateVerificationRequest, PresignRequest, UserFields};
use crate::services::api::{ApiError, VerificationApi};
use crate::services::upload::{self, UploadFailure};

/// What is being verified, independent of the files.
#[derive(Debug, Clone, Default)]
pub struct VerificationRequest {
    pub document_type: DocumentType,
    pub user_fields: UserFields,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required file(s): {}", join_fields(.0))]
    MissingFiles(Vec<DocumentField>),

    #[error("selected file for {0} is empty")]
    EmptyFile(DocumentField),

    #[error("invalid user fields: {0}")]
    UserFields(garde::Report),

    #[error("invalid workflow configuration: {0}")]
    Config(garde::Report),
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("presign failed: {0}")]
    Presign(ApiError),

    #[error("upload failed for {}", failed_fields(.failures))]
    Upload { failures: Vec<UploadFailure> },

    #[error("job creation failed: {0}")]
    JobCreation(ApiError),

    #[error("workflow task aborted: {0}")]
    Aborted(String),
}

impl WorkflowError {
    /// The step that failed.
    pub fn step(&self) -> WorkflowState {
        match self {
            WorkflowError::Validation(_) => WorkflowState::Selecting,
            WorkflowError::Presign(_) => WorkflowState::Presigning,
            WorkflowError::Upload { .. } => WorkflowState::Uploading,
            WorkflowError::JobCreation(_) => WorkflowState::CreatingJob,
            WorkflowError::Aborted(_) => WorkflowState::Failed,
        }
    }

    /// HTTP status behind the failure, if the server answered.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            WorkflowError::Presign(err) | WorkflowError::JobCreation(err) => err.status(),
            WorkflowError::Upload { failures } => failures.iter().find_map(|f| f.error.status()),
            _ => None,
        }
    }
}

fn failed_fields(failures: &[UploadFailure]) -> String {
    let fields: Vec<DocumentField> = failures.iter().map(|failure| failure.field).collect();
    join_fields(&fields)
}

fn join_fields(fields: &[DocumentField]) -> String {
    fields
        .iter()
        .map(|field| field.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// How a run ended.
#[derive(Debug)]
pub enum WorkflowOutcome {
    /// Polling observed a configured terminal status.
    Completed(VerificationJob),
    /// No terminal status within the attempt budget; the job may still finish.
    TimedOut { job: VerificationJob, attempts: u32 },
    Failed(WorkflowError),
    Cancelled { job_id: Option<String> },
}

impl WorkflowOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowOutcome::Completed(_) => "completed",
            WorkflowOutcome::TimedOut { .. } => "timed_out",
            WorkflowOutcome::Failed(_) => "failed",
            WorkflowOutcome::Cancelled { .. } => "cancelled",
        }
    }

    pub fn job(&self) -> Option<&VerificationJob> {
        match self {
            WorkflowOutcome::Completed(job) | WorkflowOutcome::TimedOut { job, .. } => Some(job),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&WorkflowError> {
        match self {
            WorkflowOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Final outcome plus the full ordered log of a run.
#[derive(Debug)]
pub struct WorkflowReport {
    pub run_id: Uuid,
    pub outcome: WorkflowOutcome,
    pub log: Vec<WorkflowLogEntry>,
}

/// Handle to a run spawned with [`start`].
///
/// Dropping the handle cancels the run.
pub struct WorkflowHandle {
    run_id: Uuid,
    logs: mpsc::UnboundedReceiver<WorkflowLogEntry>,
    state_rx: watch::Receiver<WorkflowState>,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<WorkflowReport>,
}

impl WorkflowHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> WorkflowState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WorkflowState> {
        self.state_rx.clone()
    }

    /// Next log line, or `None` once the run has finished and the log is drained.
    pub async fn next_log(&mut self) -> Option<WorkflowLogEntry> {
        self.logs.recv().await
    }

    /// Stop the run at its next step boundary. Requests already in flight
    /// complete but their results are ignored.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    /// Wait for the run to end.
    pub async fn finish(self) -> WorkflowReport {
        let WorkflowHandle {
            run_id,
            task,
            cancel_tx,
            ..
        } = self;

        let report = match task.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Workflow task aborted");
                WorkflowReport {
                    run_id,
                    outcome: WorkflowOutcome::Failed(WorkflowError::Aborted(e.to_string())),
                    log: Vec::new(),
                }
            }
        };
        drop(cancel_tx);
        report
    }
}

/// Spawn a workflow run on the current tokio runtime.
pub fn start(
    api: Arc<dyn VerificationApi>,
    files: SelectedFiles,
    request: VerificationRequest,
    config: WorkflowConfig,
) -> WorkflowHandle {
    let (log_tx, logs) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let run = WorkflowRun::new(api, request, config, cancel_rx).with_log_sink(log_tx);
    let run_id = run.run_id;
    let state_rx = run.state_tx.subscribe();

    let span = tracing::info_span!("kyc_workflow", run_id = %run_id);
    let task = tokio::spawn(run.run(files).instrument(span));

    WorkflowHandle {
        run_id,
        logs,
        state_rx,
        cancel_tx,
        task,
    }
}

/// State of one run, owned exclusively by the task driving it.
pub struct WorkflowRun {
    run_id: Uuid,
    api: Arc<dyn VerificationApi>,
    request: VerificationRequest,
    config: WorkflowConfig,
    state: WorkflowState,
    state_tx: watch::Sender<WorkflowState>,
    cancel_rx: watch::Receiver<bool>,
    log_tx: Option<mpsc::UnboundedSender<WorkflowLogEntry>>,
    history: Vec<WorkflowLogEntry>,
}

impl WorkflowRun {
    pub fn new(
        api: Arc<dyn VerificationApi>,
        request: VerificationRequest,
        config: WorkflowConfig,
        cancel_rx: watch::Receiver<bool>,
    ) -> Self {
        let (state_tx, _) = watch::channel(WorkflowState::Idle);
        Self {
            run_id: Uuid::new_v4(),
            api,
            request,
            config,
            state: WorkflowState::Idle,
            state_tx,
            cancel_rx,
            log_tx: None,
            history: Vec::new(),
        }
    }

    /// Mirror every log line to a live channel.
    pub fn with_log_sink(mut self, log_tx: mpsc::UnboundedSender<WorkflowLogEntry>) -> Self {
        self.log_tx = Some(log_tx);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Drive the run to its end.
    pub async fn run(mut self, files: SelectedFiles) -> WorkflowReport {
        let started = Instant::now();

        let outcome = match self.drive(files).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let step = err.step();
                self.log(LogLevel::Error, format!("{step} failed: {err}"));
                if let WorkflowError::Upload { failures } = &err {
                    for failure in failures {
                        self.log(
                            LogLevel::Error,
                            format!("Upload error ({}): {}", failure.field, failure.error),
                        );
                    }
                }
                // A validation failure leaves the user free to fix the selection.
                let state = match err {
                    WorkflowError::Validation(_) => WorkflowState::Selecting,
                    _ => WorkflowState::Failed,
                };
                self.set_state(state);
                WorkflowOutcome::Failed(err)
            }
        };

        metrics::counter!("kyc_workflow_runs_total", "outcome" => outcome.label()).increment(1);
        metrics::histogram!("kyc_workflow_duration_seconds").record(started.elapsed().as_secs_f64());

        tracing::info!(
            run_id = %self.run_id,
            outcome = outcome.label(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Workflow finished"
        );

        WorkflowReport {
            run_id: self.run_id,
            outcome,
            log: self.history,
        }
    }

    async fn drive(&mut self, files: SelectedFiles) -> Result<WorkflowOutcome, WorkflowError> {
        self.transition(
            WorkflowState::Selecting,
            format!("{} file(s) selected", files.len()),
        );
        let targets = self.validate(files)?;

        if self.is_cancelled() {
            return Ok(self.cancelled(None));
        }
        self.transition(WorkflowState::Presigning, "Requesting signed URLs…");
        let targets = self.presign(targets).await?;

        if self.is_cancelled() {
            return Ok(self.cancelled(None));
        }
        self.transition(
            WorkflowState::Uploading,
            format!("Uploading {} file(s) to storage…", targets.len()),
        );
        self.upload(&targets).await?;

        if self.is_cancelled() {
            return Ok(self.cancelled(None));
        }
        self.transition(WorkflowState::CreatingJob, "Creating verification job…");
        let job = self.create_job(&targets).await?;

        if self.is_cancelled() {
            return Ok(self.cancelled(Some(job.id)));
        }
        self.transition(
            WorkflowState::Polling,
            format!("Processing… polling job {} for a result", job.id),
        );
        Ok(self.poll(job).await)
    }

    fn validate(&self, files: SelectedFiles) -> Result<Vec<UploadTarget>, ValidationError> {
        self.config.validate().map_err(ValidationError::Config)?;

        let missing = files.missing(&self.config.required_fields);
        if !missing.is_empty() {
            return Err(ValidationError::MissingFiles(missing));
        }

        if let Some((field, _)) = files.iter().find(|(_, file)| file.is_empty()) {
            return Err(ValidationError::EmptyFile(field));
        }

        self.request
            .user_fields
            .validate()
            .map_err(ValidationError::UserFields)?;

        Ok(files
            .into_inner()
            .into_iter()
            .map(|(field, file)| UploadTarget::new(field, file))
            .collect())
    }

    async fn presign(
        &mut self,
        targets: Vec<UploadTarget>,
    ) -> Result<Vec<UploadTarget>, WorkflowError> {
        let request = PresignRequest {
            document_type: self.request.document_type,
            required_fields: self.config.required_fields.iter().copied().collect(),
            content_types: targets
                .iter()
                .map(|t| (t.field, t.file.content_type.clone()))
                .collect(),
            user_fields: self.request.user_fields.clone(),
        };

        let response = self
            .api
            .presign(&request)
            .await
            .map_err(WorkflowError::Presign)?;

        for field in &self.config.required_fields {
            if response.upload_url(*field).is_none() || response.object_key(*field).is_none() {
                return Err(WorkflowError::Presign(ApiError::Malformed(format!(
                    "presign response missing upload URL or object key for '{field}'"
                ))));
            }
        }

        let mut presigned = Vec::with_capacity(targets.len());
        for mut target in targets {
            match (response.upload_url(target.field), response.object_key(target.field)) {
                (Some(url), Some(key)) => {
                    target.destination_url = Some(url.to_string());
                    target.object_key = Some(key.to_string());
                    presigned.push(target);
                }
                _ => self.log(
                    LogLevel::Warn,
                    format!("Skipping {}: no upload URL issued", target.field),
                ),
            }
        }

        self.log(
            LogLevel::Info,
            format!("Received {} signed URL(s)", presigned.len()),
        );
        Ok(presigned)
    }

    async fn upload(&mut self, targets: &[UploadTarget]) -> Result<(), WorkflowError> {
        let results = upload::upload_all(self.api.as_ref(), targets).await;

        for (field, result) in &results {
            if result.is_ok() {
                self.log(LogLevel::Info, format!("Uploaded {field}"));
            }
        }

        let failures = upload::failures(results);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::Upload { failures })
        }
    }

    async fn create_job(&mut self, targets: &[UploadTarget]) -> Result<VerificationJob, WorkflowError> {
        let object_keys: BTreeMap<DocumentField, String> = targets
            .iter()
            .filter_map(|t| t.object_key.clone().map(|key| (t.field, key)))
            .collect();

        let request = CreateVerificationRequest {
            document_type: self.request.document_type,
            object_keys,
            user_fields: self.request.user_fields.clone(),
        };

        let response = self
            .api
            .create_verification(&request)
            .await
            .map_err(WorkflowError::JobCreation)?;

        let id = response
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                WorkflowError::JobCreation(ApiError::Malformed(
                    "verification response has no job id".to_string(),
                ))
            })?;

        self.log(LogLevel::Info, format!("Verification started, job: {id}"));
        Ok(VerificationJob::pending(id))
    }

    async fn poll(&mut self, mut job: VerificationJob) -> WorkflowOutcome {
        let max_attempts = self.config.max_poll_attempts;

        for attempt in 1..=max_attempts {
            if attempt > 1 && self.wait_interval().await {
                return self.cancelled(Some(job.id));
            }

            let result = self.api.get_verification(&job.id).await;
            metrics::counter!("kyc_poll_attempts_total").increment(1);
            if self.is_cancelled() {
                return self.cancelled(Some(job.id));
            }

            match result {
                Ok(response) => {
                    job.apply(response);
                    self.log(
                        LogLevel::Info,
                        format!("Poll attempt {attempt}/{max_attempts}: {}", job.status),
                    );
                    if self.config.is_terminal(job.status) {
                        self.transition(
                            WorkflowState::Terminal(job.status),
                            format!("Final status: {}", job.status),
                        );
                        return WorkflowOutcome::Completed(job);
                    }
                    if job.status == JobStatus::Unknown {
                        tracing::debug!(job_id = %job.id, "Unrecognised job status, continuing");
                    }
                }
                Err(err) => {
                    metrics::counter!("kyc_poll_failures_total").increment(1);
                    self.log(
                        LogLevel::Warn,
                        format!("Poll attempt {attempt}/{max_attempts} failed: {err}"),
                    );
                }
            }
        }

        self.transition(
            WorkflowState::TimedOut,
            format!(
                "No final status after {max_attempts} attempts; job {} is still {}, check again later",
                job.id, job.status
            ),
        );
        WorkflowOutcome::TimedOut {
            job,
            attempts: max_attempts,
        }
    }

    /// Sleep one poll interval. Returns true if the run was cancelled meanwhile.
    async fn wait_interval(&mut self) -> bool {
        let interval = self.config.poll_interval();
        let interrupted = tokio::select! {
            _ = tokio::time::sleep(interval) => false,
            _ = self.cancel_rx.wait_for(|cancelled| *cancelled) => true,
        };
        interrupted || self.is_cancelled()
    }

    /// Cancelled explicitly, or the handle holding the sender is gone.
    fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow() || self.cancel_rx.has_changed().is_err()
    }

    fn cancelled(&mut self, job_id: Option<String>) -> WorkflowOutcome {
        let message = match &job_id {
            Some(id) => format!("Cancelled; job {id} was left running"),
            None => "Cancelled".to_string(),
        };
        self.transition(WorkflowState::Cancelled, message);
        WorkflowOutcome::Cancelled { job_id }
    }

    fn transition(&mut self, state: WorkflowState, message: impl Into<String>) {
        self.set_state(state);
        self.log(LogLevel::Info, message);
    }

    fn set_state(&mut self, state: WorkflowState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let entry = WorkflowLogEntry {
            sequence: self.history.len() as u64,
            timestamp: Utc::now(),
            level,
            state: self.state,
            message: message.into(),
        };

        match level {
            LogLevel::Info => {
                tracing::info!(run_id = %self.run_id, state = %entry.state, "{}", entry.message)
            }
            LogLevel::Warn => {
                tracing::warn!(run_id = %self.run_id, state = %entry.state, "{}", entry.message)
            }
            LogLevel::Error => {
                tracing::error!(run_id = %self.run_id, state = %entry.state, "{}", entry.message)
            }
        }

        if let Some(tx) = &self.log_tx {
            let _ = tx.send(entry.clone());
        }
        self.history.push(entry);
    }
}
