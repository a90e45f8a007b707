use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use strum::{Display, EnumString};

/// Image slots a KYC submission can carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DocumentField {
    Front,
    Back,
    Selfie,
}

impl DocumentField {
    pub const ALL: [DocumentField; 3] = [DocumentField::Front, DocumentField::Back, DocumentField::Selfie];
}

/// Identity document kinds accepted by the verification API.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DocumentType {
    #[default]
    Passport,
    DriverLicense,
    AadhaarOffline,
}

/// A file picked by the user, held in memory until it is uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    /// Wrap in-memory bytes, sniffing the content type.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = detect_content_type(&file_name, &bytes).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Override the sniffed content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Read a file from disk.
    pub async fn from_path(path: &Path) -> Result<Self, std::io::Error> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::new(file_name, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Guess a MIME type from magic bytes, then from the file extension.
///
/// Falls back to `image/jpeg`, which is what the verification API presigns
/// uploads for by default.
pub fn detect_content_type(file_name: &str, bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF-") {
        return "application/pdf";
    }
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }

    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".pdf") {
        "application/pdf"
    } else {
        "image/jpeg"
    }
}

/// Files the user has picked, keyed by slot.
#[derive(Debug, Clone, Default)]
pub struct SelectedFiles {
    files: BTreeMap<DocumentField, LocalFile>,
}

impl SelectedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a file for a slot, returning the file it replaced.
    pub fn select(&mut self, field: DocumentField, file: LocalFile) -> Option<LocalFile> {
        self.files.insert(field, file)
    }

    pub fn with(mut self, field: DocumentField, file: LocalFile) -> Self {
        self.select(field, file);
        self
    }

    pub fn clear(&mut self, field: DocumentField) -> Option<LocalFile> {
        self.files.remove(&field)
    }

    pub fn get(&self, field: DocumentField) -> Option<&LocalFile> {
        self.files.get(&field)
    }

    pub fn contains(&self, field: DocumentField) -> bool {
        self.files.contains_key(&field)
    }

    /// Required slots that have no file selected.
    pub fn missing(&self, required: &BTreeSet<DocumentField>) -> Vec<DocumentField> {
        required
            .iter()
            .filter(|field| !self.files.contains_key(field))
            .copied()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentField, &LocalFile)> {
        self.files.iter().map(|(field, file)| (*field, file))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub(crate) fn into_inner(self) -> BTreeMap<DocumentField, LocalFile> {
        self.files
    }
}

/// One file on its way to object storage.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub field: DocumentField,
    pub file: LocalFile,
    /// Presigned PUT URL, set after the presign round-trip.
    pub destination_url: Option<String>,
    /// Server-assigned object key, set after the presign round-trip.
    pub object_key: Option<String>,
}

impl UploadTarget {
    pub fn new(field: DocumentField, file: LocalFile) -> Self {
        Self {
            field,
            file,
            destination_url: None,
            object_key: None,
        }
    }

    pub fn is_presigned(&self) -> bool {
        self.destination_url.is_some() && self.object_key.is_some()
    }
}
