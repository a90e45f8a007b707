use async_trait::async_trait;

use crate::models::document::LocalFile;
use crate::models::verification::{
    CreateVerificationRequest, CreateVerificationResponse, HealthReport, PresignRequest,
    PresignResponse, VerificationStatusResponse,
};

/// Remote verification API as seen by the upload-and-poll workflow.
#[async_trait]
pub trait VerificationApi: Send + Sync {
    /// `POST /v1/presign`
    async fn presign(&self, request: &PresignRequest) -> Result<PresignResponse, ApiError>;

    /// `PUT <upload_url>` with the raw file bytes.
    async fn upload(&self, upload_url: &str, file: &LocalFile) -> Result<(), ApiError>;

    /// `POST /v1/verifications`
    async fn create_verification(
        &self,
        request: &CreateVerificationRequest,
    ) -> Result<CreateVerificationResponse, ApiError>;

    /// `GET /v1/verifications/{id}`
    async fn get_verification(&self, job_id: &str) -> Result<VerificationStatusResponse, ApiError>;

    /// `GET /health`
    async fn health(&self) -> Result<HealthReport, ApiError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Network(String),

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Malformed API response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// HTTP status code, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(mut err: reqwest::Error) -> Self {
        // Presigned URLs carry their signature in the query string
        if let Some(url) = err.url_mut() {
            url.set_query(None);
        }
        if err.is_decode() {
            ApiError::Malformed(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transport_error_drops_query_string() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = reqwest::Client::new()
            .put(format!("http://{addr}/raw/front.jpg?X-Amz-Signature=SECRET"))
            .send()
            .await
            .unwrap_err();
        let err = ApiError::from(err);

        assert!(matches!(err, ApiError::Network(_)), "{err:?}");
        let message = err.to_string();
        assert!(message.contains("/raw/front.jpg"), "{message}");
        assert!(!message.contains("SECRET"), "{message}");
        assert!(!message.contains("X-Amz-Signature"), "{message}");
    }
}
