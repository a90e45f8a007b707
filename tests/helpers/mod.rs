//! Scripted in-memory verification API for workflow tests
#![allow(dead_code)]

use async_trait::async_trait;
use kyc_verify_client::models::document::LocalFile;
use kyc_verify_client::models::verification::{
    CreateVerificationRequest, CreateVerificationResponse, HealthReport, PresignRequest,
    PresignResponse, VerificationStatusResponse,
};
use kyc_verify_client::services::api::{ApiError, VerificationApi};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

use crate::fixtures::{standard_presign, status};

/// A request the workflow made against the fake.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Presign(PresignRequest),
    Upload { url: String, content_type: String },
    CreateVerification(CreateVerificationRequest),
    GetVerification(String),
    Health,
}

/// Fake API answering from a script and recording every call.
///
/// Once the scripted polls run out, every further poll reports `pending`.
pub struct FakeApi {
    presign: Result<PresignResponse, ApiError>,
    upload_status: BTreeMap<String, u16>,
    create: Result<CreateVerificationResponse, ApiError>,
    polls: Mutex<VecDeque<Result<VerificationStatusResponse, ApiError>>>,
    upload_barrier: Option<Arc<Barrier>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            presign: Ok(standard_presign()),
            upload_status: BTreeMap::new(),
            create: Ok(CreateVerificationResponse {
                id: Some("job-42".to_string()),
                status: Some("pending".to_string()),
            }),
            polls: Mutex::new(VecDeque::new()),
            upload_barrier: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_presign(mut self, presign: Result<PresignResponse, ApiError>) -> Self {
        self.presign = presign;
        self
    }

    /// Make the PUT to `url` answer with `status`.
    pub fn failing_upload(mut self, url: &str, status: u16) -> Self {
        self.upload_status.insert(url.to_string(), status);
        self
    }

    /// Hold every PUT until `parties` uploads are in flight at once.
    pub fn with_upload_barrier(mut self, parties: usize) -> Self {
        self.upload_barrier = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub fn with_create(mut self, create: Result<CreateVerificationResponse, ApiError>) -> Self {
        self.create = create;
        self
    }

    pub fn with_polls(
        mut self,
        polls: impl IntoIterator<Item = Result<VerificationStatusResponse, ApiError>>,
    ) -> Self {
        self.polls = Mutex::new(polls.into_iter().collect());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.count(|call| matches!(call, Call::GetVerification(_)))
    }

    pub fn upload_count(&self) -> usize {
        self.count(|call| matches!(call, Call::Upload { .. }))
    }

    /// The job creation request, if one was made.
    pub fn create_request(&self) -> Option<CreateVerificationRequest> {
        self.calls().into_iter().find_map(|call| match call {
            Call::CreateVerification(request) => Some(request),
            _ => None,
        })
    }

    fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

/// A connection-level failure.
pub fn network_error() -> ApiError {
    ApiError::Network("connection reset by peer".to_string())
}

pub fn status_error(method: &'static str, url: &str, status: u16) -> ApiError {
    ApiError::Status {
        method,
        url: url.to_string(),
        status,
        body: "denied".to_string(),
    }
}

#[async_trait]
impl VerificationApi for FakeApi {
    async fn presign(&self, request: &PresignRequest) -> Result<PresignResponse, ApiError> {
        self.record(Call::Presign(request.clone()));
        self.presign.clone()
    }

    async fn upload(&self, upload_url: &str, file: &LocalFile) -> Result<(), ApiError> {
        self.record(Call::Upload {
            url: upload_url.to_string(),
            content_type: file.content_type.clone(),
        });
        if let Some(barrier) = &self.upload_barrier {
            barrier.wait().await;
        }
        match self.upload_status.get(upload_url) {
            Some(code) if !(200..300).contains(code) => Err(status_error("PUT", upload_url, *code)),
            _ => Ok(()),
        }
    }

    async fn create_verification(
        &self,
        request: &CreateVerificationRequest,
    ) -> Result<CreateVerificationResponse, ApiError> {
        self.record(Call::CreateVerification(request.clone()));
        self.create.clone()
    }

    async fn get_verification(&self, job_id: &str) -> Result<VerificationStatusResponse, ApiError> {
        self.record(Call::GetVerification(job_id.to_string()));
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(status("pending")))
    }

    async fn health(&self) -> Result<HealthReport, ApiError> {
        self.record(Call::Health);
        Ok(HealthReport {
            status_code: 200,
            body: r#"{"ok":true}"#.to_string(),
            latency_ms: 0,
        })
    }
}
