use futures::future::join_all;

use crate::models::document::{DocumentField, UploadTarget};
use crate::services::api::{ApiError, VerificationApi};

/// A transfer that did not succeed.
#[derive(Debug, Clone)]
pub struct UploadFailure {
    pub field: DocumentField,
    pub error: ApiError,
}

/// PUT every target concurrently and wait for all of them to settle.
///
/// Results come back in target order. A target missing its destination URL
/// or object key fails without a request being made.
pub async fn upload_all(
    api: &dyn VerificationApi,
    targets: &[UploadTarget],
) -> Vec<(DocumentField, Result<(), ApiError>)> {
    let transfers = targets.iter().map(|target| async move {
        let result = match target.destination_url.as_deref() {
            Some(url) if target.is_presigned() => api.upload(url, &target.file).await,
            _ => Err(ApiError::Malformed(format!(
                "{} has not been presigned",
                target.field
            ))),
        };
        (target.field, result)
    });

    join_all(transfers).await
}

/// Split settled transfers into the failures, if any.
pub fn failures(results: Vec<(DocumentField, Result<(), ApiError>)>) -> Vec<UploadFailure> {
    results
        .into_iter()
        .filter_map(|(field, result)| result.err().map(|error| UploadFailure { field, error }))
        .collect()
}
