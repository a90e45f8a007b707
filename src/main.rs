use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use kyc_verify_client::config::AppConfig;
use kyc_verify_client::models::document::{LocalFile, SelectedFiles};
use kyc_verify_client::services::api::VerificationApi;
use kyc_verify_client::services::http::HttpVerificationClient;
use kyc_verify_client::services::workflow::{self, VerificationRequest, WorkflowOutcome};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");
    let workflow_config = config
        .workflow_config()
        .expect("Invalid workflow configuration");
    let document_type = config.document_type().expect("Invalid DOCUMENT_TYPE");

    metrics::describe_counter!("kyc_workflow_runs_total", "Workflow runs by outcome");
    metrics::describe_histogram!(
        "kyc_workflow_duration_seconds",
        "Wall time from submission to outcome"
    );
    metrics::describe_counter!("kyc_poll_attempts_total", "Job status polls issued");
    metrics::describe_counter!(
        "kyc_poll_failures_total",
        "Job status polls that failed transiently"
    );

    tracing::info!(api = %config.api_base_url, "Initializing verification API client");
    let client = HttpVerificationClient::new(&config.api_base_url, config.request_timeout())
        .expect("Failed to initialize HTTP client");

    // Connectivity check is informational; the workflow reports its own failures
    match client.health().await {
        Ok(report) if report.is_ok() => {
            tracing::info!(latency_ms = report.latency_ms, body = %report.body, "API reachable")
        }
        Ok(report) => tracing::warn!(
            status = report.status_code,
            body = %report.body,
            "API health check returned non-success"
        ),
        Err(e) => tracing::warn!(error = %e, "API health check failed"),
    }

    let mut files = SelectedFiles::new();
    for (field, path) in config.image_paths() {
        match LocalFile::from_path(&path).await {
            Ok(file) => {
                tracing::info!(
                    field = %field,
                    path = %path.display(),
                    bytes = file.len(),
                    content_type = %file.content_type,
                    "Selected file"
                );
                files.select(field, file);
            }
            Err(e) => {
                tracing::error!(field = %field, path = %path.display(), error = %e, "Failed to read file");
                return ExitCode::FAILURE;
            }
        }
    }

    let request = VerificationRequest {
        document_type,
        user_fields: config.user_fields(),
    };

    let api: Arc<dyn VerificationApi> = Arc::new(client);
    let mut handle = workflow::start(api, files, request, workflow_config);

    // Stream the log until the run ends; Ctrl-C tears it down
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    loop {
        let next = tokio::select! {
            entry = handle.next_log() => Some(entry),
            _ = &mut ctrl_c, if !interrupted => None,
        };
        match next {
            Some(Some(entry)) => println!("{entry}"),
            Some(None) => break,
            None => {
                tracing::warn!("Interrupted, cancelling workflow");
                interrupted = true;
                handle.cancel();
            }
        }
    }

    let report = handle.finish().await;
    match &report.outcome {
        WorkflowOutcome::Completed(job) => {
            println!(
                "{}",
                serde_json::to_string_pretty(job).unwrap_or_else(|_| format!("{job:?}"))
            );
            ExitCode::SUCCESS
        }
        WorkflowOutcome::TimedOut { job, attempts } => {
            println!("Job {} still {} after {attempts} polls", job.id, job.status);
            ExitCode::from(2)
        }
        WorkflowOutcome::Failed(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
        WorkflowOutcome::Cancelled { .. } => ExitCode::from(130),
    }
}
