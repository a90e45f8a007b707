use kyc_verify_client::config::AppConfig;
use kyc_verify_client::services::api::VerificationApi;
use kyc_verify_client::services::http::HttpVerificationClient;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Probe `GET /health` on the configured API and print the result.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration");
    let client = HttpVerificationClient::new(&config.api_base_url, config.request_timeout())
        .expect("Failed to initialize HTTP client");

    tracing::info!(api = %client.base_url(), "Checking API health");

    match client.health().await {
        Ok(report) => {
            println!(
                "{}",
                serde_json::to_string(&report).unwrap_or_else(|_| format!("{report:?}"))
            );
            if report.is_ok() {
                tracing::info!(latency_ms = report.latency_ms, "API healthy");
                ExitCode::SUCCESS
            } else {
                tracing::error!(status = report.status_code, "API unhealthy");
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "API unreachable");
            ExitCode::FAILURE
        }
    }
}
