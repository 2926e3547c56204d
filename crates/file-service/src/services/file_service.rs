//! File plane use cases: upload routing, gated download, soft delete.

use crate::config::UploadSettings;
use crate::errors::FileError;
use crate::models::{
    Bucket, FileRecord, NewFileRecord, PresignedUrlResponse, UploadRequest, DEFAULT_MIME_TYPE,
    MAX_FILENAME_LENGTH, MAX_TAGS, MAX_TAG_LENGTH,
};
use crate::observability::record_upload;
use crate::repositories::FileRepository;
use crate::services::object_store::{ObjectStore, StoredObject};
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Longest extension kept on a stored name.
const MAX_EXTENSION_LENGTH: usize = 16;

pub struct FileService {
    files: Arc<dyn FileRepository>,
    store: Arc<dyn ObjectStore>,
    settings: UploadSettings,
}

impl FileService {
    pub fn new(
        files: Arc<dyn FileRepository>,
        store: Arc<dyn ObjectStore>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            files,
            store,
            settings,
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.settings.max_upload_bytes
    }

    /// Create every known bucket that is missing. Run once at startup.
    pub async fn ensure_buckets(&self) -> Result<(), FileError> {
        for bucket in Bucket::ALL {
            self.store.ensure_bucket(bucket.as_str()).await?;
        }
        info!(target: "file.service", count = Bucket::ALL.len(), "Buckets ready");
        Ok(())
    }

    #[instrument(skip_all, name = "file.upload", fields(size = request.data.len()))]
    pub async fn upload(&self, request: UploadRequest) -> Result<FileRecord, FileError> {
        let size = request.data.len() as u64;
        if size > self.settings.max_upload_bytes {
            return Err(FileError::PayloadTooLarge {
                limit: self.settings.max_upload_bytes,
            });
        }
        if size == 0 {
            return Err(FileError::Validation("file is empty".to_string()));
        }

        let original_filename = sanitize_filename(&request.original_filename)?;
        let tags = normalize_tags(&request.tags)?;
        let mime_type = normalize_mime(request.content_type.as_deref())?;
        let bucket = Bucket::resolve(request.bucket_name.as_deref(), &tags, &mime_type)?;
        let stored_filename = stored_filename(&original_filename);

        self.store
            .put_object(bucket.as_str(), &stored_filename, request.data, &mime_type)
            .await?;

        let new = NewFileRecord {
            id: Uuid::new_v4(),
            original_filename,
            stored_filename,
            bucket_name: bucket,
            mime_type,
            size_bytes: i64::try_from(size).map_err(|_| FileError::Internal)?,
            uploaded_by: request.uploaded_by,
            tags,
        };
        let stored = new.stored_filename.clone();

        let record = match self.files.insert(new).await {
            Ok(record) => record,
            Err(e) => {
                if let Err(cleanup) = self.store.delete_object(bucket.as_str(), &stored).await {
                    warn!(
                        target: "file.service",
                        bucket = %bucket,
                        stored_filename = %stored,
                        error = %cleanup,
                        "Orphaned object left after metadata insert failure"
                    );
                }
                return Err(e);
            }
        };

        record_upload(bucket.as_str(), size);
        info!(
            target: "file.service",
            file_id = %record.id,
            bucket = %bucket,
            size_bytes = record.size_bytes,
            "File uploaded"
        );
        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> Result<FileRecord, FileError> {
        self.files.find_by_id(id).await?.ok_or_else(not_found)
    }

    pub async fn list_for_uploader(&self, uploader: Uuid) -> Result<Vec<FileRecord>, FileError> {
        self.files.list_by_uploader(uploader).await
    }

    /// Open a live file for streaming. When `bucket` is given it must be the
    /// record's bucket; a mismatch looks exactly like a missing file.
    #[instrument(skip(self), name = "file.download")]
    pub async fn download(
        &self,
        id: Uuid,
        bucket: Option<&str>,
    ) -> Result<(FileRecord, StoredObject), FileError> {
        let record = self.get(id).await?;
        if bucket.is_some_and(|b| b != record.bucket_name.as_str()) {
            return Err(not_found());
        }

        let object = self
            .store
            .get_object(record.bucket_name.as_str(), &record.stored_filename)
            .await?;
        Ok((record, object))
    }

    pub async fn presigned_url(&self, id: Uuid) -> Result<PresignedUrlResponse, FileError> {
        let record = self.get(id).await?;
        let expires_in = self.settings.presigned_url_expiry;
        let url = self
            .store
            .presigned_get_url(record.bucket_name.as_str(), &record.stored_filename, expires_in)
            .await?;

        let expires_at = Utc::now()
            + chrono::Duration::from_std(expires_in).map_err(|_| FileError::Internal)?;
        Ok(PresignedUrlResponse { url, expires_at })
    }

    /// Soft-delete a file. Only the uploader or an admin may delete.
    ///
    /// Object removal is best effort; the hidden metadata row is what makes
    /// the file unreachable.
    #[instrument(skip(self), name = "file.delete")]
    pub async fn delete(&self, id: Uuid, requester: Uuid, is_admin: bool) -> Result<(), FileError> {
        let record = self.get(id).await?;
        if record.uploaded_by != requester && !is_admin {
            return Err(FileError::Forbidden(
                "only the uploader or an admin may delete this file".to_string(),
            ));
        }

        let deleted = self.files.soft_delete(id).await?.ok_or_else(not_found)?;

        if let Err(e) = self
            .store
            .delete_object(deleted.bucket_name.as_str(), &deleted.stored_filename)
            .await
        {
            warn!(
                target: "file.service",
                file_id = %id,
                error = %e,
                "Object removal failed after soft delete"
            );
        }

        info!(target: "file.service", file_id = %id, "File deleted");
        Ok(())
    }
}

fn not_found() -> FileError {
    FileError::NotFound("file not found".to_string())
}

/// Keep only the final path component of a client-supplied name.
fn sanitize_filename(raw: &str) -> Result<String, FileError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(FileError::Validation("a file name is required".to_string()));
    }
    if name.chars().any(char::is_control) {
        return Err(FileError::Validation(
            "file name contains control characters".to_string(),
        ));
    }
    if name.chars().count() > MAX_FILENAME_LENGTH {
        return Err(FileError::Validation(format!(
            "file name exceeds {MAX_FILENAME_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

/// Lowercase, trim, drop empties, dedupe.
fn normalize_tags(raw: &[String]) -> Result<Vec<String>, FileError> {
    let tags: BTreeSet<String> = raw
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    if tags.len() > MAX_TAGS {
        return Err(FileError::Validation(format!(
            "at most {MAX_TAGS} tags are allowed"
        )));
    }
    if let Some(tag) = tags.iter().find(|t| t.chars().count() > MAX_TAG_LENGTH) {
        return Err(FileError::Validation(format!(
            "tag '{tag}' exceeds {MAX_TAG_LENGTH} characters"
        )));
    }
    Ok(tags.into_iter().collect())
}

fn normalize_mime(raw: Option<&str>) -> Result<String, FileError> {
    let Some(mime) = raw.map(str::trim).filter(|m| !m.is_empty()) else {
        return Ok(DEFAULT_MIME_TYPE.to_string());
    };

    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence.split_once('/') {
        Some((major, minor)) if !major.is_empty() && !minor.is_empty() => {
            Ok(essence.to_ascii_lowercase())
        }
        _ => Err(FileError::Validation(format!("invalid content type '{mime}'"))),
    }
}

/// `<uuid>` plus the original extension, lowercased.
fn stored_filename(original: &str) -> String {
    let extension = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| {
            !e.is_empty()
                && e.len() <= MAX_EXTENSION_LENGTH
                && e.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
        None => Uuid::new_v4().to_string(),
    }
}
