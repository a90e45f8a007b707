use garde::Validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::document::{DocumentField, DocumentType};

/// Applicant details sent alongside the images.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct UserFields {
    #[garde(length(min = 1, max = 200))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Date of birth, `YYYY-MM-DD`.
    #[garde(custom(validate_dob))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
}

fn validate_dob(value: &Option<String>, _ctx: &()) -> garde::Result {
    match value {
        Some(dob) if chrono::NaiveDate::parse_from_str(dob, "%Y-%m-%d").is_err() => {
            Err(garde::Error::new("date of birth must be YYYY-MM-DD"))
        }
        _ => Ok(()),
    }
}

/// Body of `POST /v1/presign`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresignRequest {
    pub document_type: DocumentType,
    pub required_fields: Vec<DocumentField>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content_types: BTreeMap<DocumentField, String>,
    #[serde(default)]
    pub user_fields: UserFields,
}

/// Response of `POST /v1/presign`.
///
/// Keys are plain strings so an API that presigns extra slots does not
/// break deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PresignResponse {
    #[serde(default)]
    pub upload_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub object_keys: BTreeMap<String, String>,
}

impl PresignResponse {
    pub fn upload_url(&self, field: DocumentField) -> Option<&str> {
        non_empty(self.upload_urls.get(field.to_string().as_str()))
    }

    pub fn object_key(&self, field: DocumentField) -> Option<&str> {
        non_empty(self.object_keys.get(field.to_string().as_str()))
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.trim().is_empty())
}

/// Body of `POST /v1/verifications`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateVerificationRequest {
    pub document_type: DocumentType,
    pub object_keys: BTreeMap<DocumentField, String>,
    #[serde(default)]
    pub user_fields: UserFields,
}

/// Response of `POST /v1/verifications`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateVerificationResponse {
    pub id: Option<String>,
    pub status: Option<String>,
}

/// Response of `GET /v1/verifications/{id}` and `POST /v1/verify-kyc`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationStatusResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "unknown_status")]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub fields: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub explanations: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub report_pdf_url: Option<String>,
}

fn unknown_status() -> String {
    "unknown".to_string()
}

impl VerificationStatusResponse {
    /// A bare response carrying only a status string.
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            id: None,
            status: status.into(),
            message: None,
            reason: None,
            fields: None,
            score: None,
            explanations: None,
            report_pdf_url: None,
        }
    }
}

/// Outcome of a `GET /health` probe.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthReport {
    pub status_code: u16,
    pub body: String,
    pub latency_ms: u64,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_fields_validation() {
        let valid = UserFields {
            name: Some("Jane Doe".to_string()),
            dob: Some("1999-01-01".to_string()),
        };
        assert!(valid.validate().is_ok());
        assert!(UserFields::default().validate().is_ok());

        let bad_dob = UserFields {
            name: None,
            dob: Some("01/01/1999".to_string()),
        };
        assert!(bad_dob.validate().is_err());

        let empty_name = UserFields {
            name: Some(String::new()),
            dob: None,
        };
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_presign_lookup_ignores_blank_entries() {
        let response: PresignResponse = serde_json::from_value(json!({
            "upload_urls": {"front": "https://s3/u1", "back": "", "extra": "https://s3/x"},
            "object_keys": {"front": "raw/k1", "back": "raw/k2"}
        }))
        .unwrap();

        assert_eq!(response.upload_url(DocumentField::Front), Some("https://s3/u1"));
        assert_eq!(response.upload_url(DocumentField::Back), None);
        assert_eq!(response.object_key(DocumentField::Back), Some("raw/k2"));
        assert_eq!(response.upload_url(DocumentField::Selfie), None);
    }

    #[test]
    fn test_create_request_wire_shape() {
        let request = CreateVerificationRequest {
            document_type: DocumentType::AadhaarOffline,
            object_keys: [(DocumentField::Front, "k1".to_string())].into(),
            user_fields: UserFields::default(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "document_type": "aadhaar_offline",
                "object_keys": {"front": "k1"},
                "user_fields": {}
            })
        );
    }

    #[test]
    fn test_status_response_defaults() {
        let response: VerificationStatusResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response.status, "unknown");
        assert!(response.explanations.is_none());
    }

    #[test]
    fn test_status_response_accepts_explicit_nulls() {
        let response: VerificationStatusResponse = serde_json::from_value(json!({
            "id": "ver_1",
            "status": "processing",
            "fields": null,
            "score": null,
            "explanations": null,
            "report_pdf_url": null
        }))
        .unwrap();
        assert_eq!(response.status, "processing");
        assert!(response.explanations.is_none());
    }
}
