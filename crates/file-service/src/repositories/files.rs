//! File metadata repository.
//!
//! Every read filters on `deleted_at IS NULL`; a soft-deleted record is
//! indistinguishable from one that never existed.

use crate::errors::FileError;
use crate::models::{Bucket, FileRecord, NewFileRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn insert(&self, file: NewFileRecord) -> Result<FileRecord, FileError>;

    /// Live record by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, FileError>;

    /// Live records uploaded by `uploader`, newest first.
    async fn list_by_uploader(&self, uploader: Uuid) -> Result<Vec<FileRecord>, FileError>;

    /// Stamp `deleted_at` on a live record and return it as it was.
    /// Returns `None` when the record is missing or already deleted.
    async fn soft_delete(&self, id: Uuid) -> Result<Option<FileRecord>, FileError>;
}

const FILE_COLUMNS: &str = "id, original_filename, stored_filename, bucket_name, mime_type, \
     size_bytes, uploaded_by, tags, created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FileRow {
    id: Uuid,
    original_filename: String,
    stored_filename: String,
    bucket_name: String,
    mime_type: String,
    size_bytes: i64,
    uploaded_by: Uuid,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = FileError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let bucket_name: Bucket = row.bucket_name.parse().map_err(|_| {
            FileError::Database(format!(
                "file {} references unknown bucket '{}'",
                row.id, row.bucket_name
            ))
        })?;

        Ok(FileRecord {
            id: row.id,
            original_filename: row.original_filename,
            stored_filename: row.stored_filename,
            bucket_name,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
            uploaded_by: row.uploaded_by,
            tags: row.tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn insert(&self, file: NewFileRecord) -> Result<FileRecord, FileError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            r#"
            INSERT INTO files (id, original_filename, stored_filename, bucket_name, mime_type,
                               size_bytes, uploaded_by, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {FILE_COLUMNS}
            "#
        ))
        .bind(file.id)
        .bind(&file.original_filename)
        .bind(&file.stored_filename)
        .bind(file.bucket_name.as_str())
        .bind(&file.mime_type)
        .bind(file.size_bytes)
        .bind(file.uploaded_by)
        .bind(&file.tags)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, FileError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecord::try_from).transpose()
    }

    async fn list_by_uploader(&self, uploader: Uuid) -> Result<Vec<FileRecord>, FileError> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            r#"
            SELECT {FILE_COLUMNS} FROM files
            WHERE uploaded_by = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#
        ))
        .bind(uploader)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FileRecord::try_from).collect()
    }

    async fn soft_delete(&self, id: Uuid) -> Result<Option<FileRecord>, FileError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            r#"
            UPDATE files
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {FILE_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecord::try_from).transpose()
    }
}

/// In-memory file index for tests.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryFileRepository {
        files: Mutex<HashMap<Uuid, FileRecord>>,
        fail_inserts: std::sync::atomic::AtomicBool,
    }

    impl InMemoryFileRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail_inserts(&self, fail: bool) {
            self.fail_inserts
                .store(fail, std::sync::atomic::Ordering::SeqCst);
        }

        /// Raw lookup that includes soft-deleted rows.
        pub async fn raw(&self, id: Uuid) -> Option<FileRecord> {
            self.files.lock().await.get(&id).cloned()
        }
    }

    #[async_trait]
    impl FileRepository for InMemoryFileRepository {
        async fn insert(&self, file: NewFileRecord) -> Result<FileRecord, FileError> {
            if self.fail_inserts.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(FileError::Database("simulated insert failure".to_string()));
            }

            let now = Utc::now();
            let record = FileRecord {
                id: file.id,
                original_filename: file.original_filename,
                stored_filename: file.stored_filename,
                bucket_name: file.bucket_name,
                mime_type: file.mime_type,
                size_bytes: file.size_bytes,
                uploaded_by: file.uploaded_by,
                tags: file.tags,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            self.files.lock().await.insert(record.id, record.clone());
            Ok(record)
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, FileError> {
            Ok(self
                .files
                .lock()
                .await
                .get(&id)
                .filter(|f| !f.is_deleted())
                .cloned())
        }

        async fn list_by_uploader(&self, uploader: Uuid) -> Result<Vec<FileRecord>, FileError> {
            let mut files: Vec<FileRecord> = self
                .files
                .lock()
                .await
                .values()
                .filter(|f| f.uploaded_by == uploader && !f.is_deleted())
                .cloned()
                .collect();
            files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(files)
        }

        async fn soft_delete(&self, id: Uuid) -> Result<Option<FileRecord>, FileError> {
            let mut files = self.files.lock().await;
            let Some(file) = files.get_mut(&id).filter(|f| !f.is_deleted()) else {
                return Ok(None);
            };
            let before = file.clone();
            let now = Utc::now();
            file.deleted_at = Some(now);
            file.updated_at = now;
            Ok(Some(before))
        }
    }
}
