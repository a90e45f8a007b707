//! reqwest-backed client for the KYC verification API.

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use std::time::{Duration, Instant};

use crate::models::document::LocalFile;
use crate::models::verification::{
    CreateVerificationRequest, CreateVerificationResponse, HealthReport, PresignRequest,
    PresignResponse, VerificationStatusResponse,
};
use crate::services::api::{ApiError, VerificationApi};

/// Longest error body kept in diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 400;

pub struct HttpVerificationClient {
    http: Client,
    base_url: String,
}

impl HttpVerificationClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kyc-verify-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/v1/verifications/{id}` with the id percent-encoded as one path segment.
    fn job_url(&self, job_id: &str) -> Result<String, ApiError> {
        let mut url = reqwest::Url::parse(&self.endpoint("/v1/verifications"))
            .map_err(|e| ApiError::Malformed(format!("invalid API base URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Malformed(format!("API base URL {} cannot take a path", self.base_url)))?
            .push(job_id);
        Ok(url.into())
    }

    /// Single-request variant: `POST /v1/verify-kyc` with the document and
    /// selfie as multipart parts. Bypasses presigning and polling.
    pub async fn submit_direct(
        &self,
        document: &LocalFile,
        selfie: &LocalFile,
    ) -> Result<VerificationStatusResponse, ApiError> {
        let url = self.endpoint("/v1/verify-kyc");
        let form = multipart::Form::new()
            .part("document", file_part(document)?)
            .part("selfie", file_part(selfie)?);

        tracing::debug!(url = %url, "Submitting documents directly");
        let response = self.http.post(&url).multipart(form).send().await?;
        let response = ensure_success("POST", &url, response).await?;
        Ok(response.json().await?)
    }
}

fn file_part(file: &LocalFile) -> Result<multipart::Part, ApiError> {
    multipart::Part::bytes(file.bytes.clone())
        .file_name(file.file_name.clone())
        .mime_str(&file.content_type)
        .map_err(|e| ApiError::Malformed(format!("invalid content type {}: {e}", file.content_type)))
}

/// Turn a non-2xx response into `ApiError::Status`, keeping a truncated body.
async fn ensure_success(
    method: &'static str,
    url: &str,
    response: Response,
) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        method,
        url: redact_query(url),
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

/// Presigned URLs carry credentials in the query string.
fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?…"),
        None => url.to_string(),
    }
}

#[async_trait]
impl VerificationApi for HttpVerificationClient {
    async fn presign(&self, request: &PresignRequest) -> Result<PresignResponse, ApiError> {
        let url = self.endpoint("/v1/presign");
        let response = self.http.post(&url).json(request).send().await?;
        let response = ensure_success("POST", &url, response).await?;
        Ok(response.json().await?)
    }

    async fn upload(&self, upload_url: &str, file: &LocalFile) -> Result<(), ApiError> {
        let response = self
            .http
            .put(upload_url)
            .header(reqwest::header::CONTENT_TYPE, file.content_type.as_str())
            .body(file.bytes.clone())
            .send()
            .await?;
        ensure_success("PUT", upload_url, response).await?;
        Ok(())
    }

    async fn create_verification(
        &self,
        request: &CreateVerificationRequest,
    ) -> Result<CreateVerificationResponse, ApiError> {
        let url = self.endpoint("/v1/verifications");
        let response = self.http.post(&url).json(request).send().await?;
        let response = ensure_success("POST", &url, response).await?;
        Ok(response.json().await?)
    }

    async fn get_verification(&self, job_id: &str) -> Result<VerificationStatusResponse, ApiError> {
        let url = self.job_url(job_id)?;
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await?;
        let response = ensure_success("GET", &url, response).await?;
        Ok(response.json().await?)
    }

    async fn health(&self) -> Result<HealthReport, ApiError> {
        let url = self.endpoint("/health");
        let start = Instant::now();
        let response = self.http.get(&url).send().await?;
        let status_code = response.status().as_u16();
        let body = response.text().await?;

        Ok(HealthReport {
            status_code,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
