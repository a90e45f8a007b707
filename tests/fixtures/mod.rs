//! Test fixtures: sample images and canned API payloads
#![allow(dead_code)]

use kyc_verify_client::config::WorkflowConfig;
use kyc_verify_client::models::document::{DocumentField, LocalFile, SelectedFiles};
use kyc_verify_client::models::verification::{PresignResponse, VerificationStatusResponse};
use std::collections::BTreeMap;

/// JFIF header; enough for content type sniffing.
pub const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00,
];

/// PNG signature followed by a stub IHDR length.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D];

pub fn jpeg(name: &str) -> LocalFile {
    LocalFile::new(name, JPEG_BYTES.to_vec())
}

pub fn png(name: &str) -> LocalFile {
    LocalFile::new(name, PNG_BYTES.to_vec())
}

/// Front, back and selfie all selected.
pub fn all_files() -> SelectedFiles {
    SelectedFiles::new()
        .with(DocumentField::Front, jpeg("front.jpg"))
        .with(DocumentField::Back, jpeg("back.jpg"))
        .with(DocumentField::Selfie, png("selfie.png"))
}

/// `{upload_urls: {front: u1, back: u2, selfie: u3}, object_keys: {front: k1, back: k2, selfie: k3}}`
pub fn standard_presign() -> PresignResponse {
    PresignResponse {
        upload_urls: BTreeMap::from([
            ("front".to_string(), "u1".to_string()),
            ("back".to_string(), "u2".to_string()),
            ("selfie".to_string(), "u3".to_string()),
        ]),
        object_keys: BTreeMap::from([
            ("front".to_string(), "k1".to_string()),
            ("back".to_string(), "k2".to_string()),
            ("selfie".to_string(), "k3".to_string()),
        ]),
    }
}

pub fn status(status: &str) -> VerificationStatusResponse {
    VerificationStatusResponse::with_status(status)
}

pub fn approved_with_name(full_name: &str) -> VerificationStatusResponse {
    let mut response = VerificationStatusResponse::with_status("approved");
    response.fields = Some(BTreeMap::from([(
        "full_name".to_string(),
        serde_json::Value::String(full_name.to_string()),
    )]));
    response.score = Some(92.0);
    response
}

/// All three slots required, 1.5 s between polls, 10 attempts.
pub fn three_field_config() -> WorkflowConfig {
    WorkflowConfig {
        poll_interval_ms: 1500,
        max_poll_attempts: 10,
        required_fields: DocumentField::ALL.into(),
        ..WorkflowConfig::default()
    }
}
