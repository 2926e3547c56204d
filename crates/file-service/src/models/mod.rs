//! File records, buckets, and API shapes.

pub mod bucket;

pub use bucket::Bucket;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const MAX_FILENAME_LENGTH: usize = 255;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LENGTH: usize = 50;

/// Fallback when the client sends no content type.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Metadata for one stored object. Soft-deleted rows never leave the
/// repository layer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileRecord {
    pub id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub bucket_name: Bucket,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    /// Sorted and deduplicated.
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub bucket_name: Bucket,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    pub tags: Vec<String>,
}

/// A parsed multipart upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub original_filename: String,
    pub content_type: Option<String>,
    pub data: bytes::Bytes,
    pub bucket_name: Option<String>,
    pub tags: Vec<String>,
    pub uploaded_by: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PresignedUrlResponse {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
