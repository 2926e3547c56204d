//! `/api/v1/files` and `/api/v1/buckets` handlers.

use crate::errors::FileError;
use crate::models::{FileRecord, PresignedUrlResponse, UploadRequest, DEFAULT_MIME_TYPE};
use crate::observability::{record_download, record_file_operation};
use crate::routes::AppState;
use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError},
        Multipart, Path, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::{Bytes, BytesMut};
use common::identity::GatewayIdentity;
use std::fmt::Write;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

fn observe<T>(operation: &'static str, result: &Result<T, FileError>) {
    record_file_operation(operation, result.as_ref().err().map(FileError::code));
}

fn caller_id(identity: &GatewayIdentity) -> Result<Uuid, FileError> {
    Uuid::parse_str(&identity.user_id).map_err(|_| FileError::Unauthenticated)
}

fn multipart_error(limit: u64) -> impl Fn(MultipartError) -> FileError {
    move |e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            FileError::PayloadTooLarge { limit }
        } else {
            FileError::Validation(format!("malformed multipart body: {}", e.body_text()))
        }
    }
}

/// Buffer a multipart field, failing as soon as it passes `limit`.
async fn read_capped(mut field: Field<'_>, limit: u64) -> Result<Bytes, FileError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error(limit))? {
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(FileError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// POST /api/v1/files
///
/// Multipart fields: `file` (required), `bucket_name`, `tags`
/// (comma-separated). Unknown fields are ignored.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    identity: GatewayIdentity,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileRecord>), FileError> {
    let result = async {
        let uploaded_by = caller_id(&identity)?;
        let limit = state.files.max_upload_bytes();

        let mut file = None;
        let mut bucket_name = None;
        let mut tags = Vec::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(multipart_error(limit))?
        {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") => {
                    let filename = field.file_name().map(str::to_string).unwrap_or_default();
                    let content_type = field.content_type().map(str::to_string);
                    let data = read_capped(field, limit).await?;
                    file = Some((filename, content_type, data));
                }
                Some("bucket_name") => {
                    bucket_name = Some(field.text().await.map_err(multipart_error(limit))?);
                }
                Some("tags") => {
                    let raw = field.text().await.map_err(multipart_error(limit))?;
                    tags.extend(raw.split(',').map(str::to_string));
                }
                _ => {}
            }
        }

        let (original_filename, content_type, data) =
            file.ok_or_else(|| FileError::Validation("missing 'file' field".to_string()))?;

        state
            .files
            .upload(UploadRequest {
                original_filename,
                content_type,
                data,
                bucket_name,
                tags,
                uploaded_by,
            })
            .await
    }
    .await;

    observe("upload", &result);
    Ok((StatusCode::CREATED, Json(result?)))
}

/// GET /api/v1/files
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    identity: GatewayIdentity,
) -> Result<Json<Vec<FileRecord>>, FileError> {
    let uploader = caller_id(&identity)?;
    Ok(Json(state.files.list_for_uploader(uploader).await?))
}

/// GET /api/v1/files/:id
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<FileRecord>, FileError> {
    Ok(Json(state.files.get(id).await?))
}

/// GET /api/v1/files/:id/download
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, FileError> {
    stream_file(&state, id, None).await
}

/// GET /api/v1/buckets/:bucket/files/:id/download
pub async fn download_bucket_file(
    State(state): State<Arc<AppState>>,
    Path((bucket, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, FileError> {
    stream_file(&state, id, Some(&bucket)).await
}

async fn stream_file(
    state: &AppState,
    id: Uuid,
    bucket: Option<&str>,
) -> Result<(HeaderMap, Body), FileError> {
    let result = state.files.download(id, bucket).await;
    observe("download", &result);
    let (record, object) = result?;
    record_download(record.bucket_name.as_str());

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&record.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_MIME_TYPE)),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(&record.original_filename),
    );
    if let Some(length) = object.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    Ok((headers, Body::from_stream(ReaderStream::new(object.reader))))
}

/// GET /api/v1/files/:id/presigned-url
pub async fn presigned_url(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PresignedUrlResponse>, FileError> {
    let result = state.files.presigned_url(id).await;
    observe("presign", &result);
    Ok(Json(result?))
}

/// DELETE /api/v1/files/:id
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    identity: GatewayIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, FileError> {
    let result = match caller_id(&identity) {
        Ok(requester) => state.files.delete(id, requester, identity.is_admin()).await,
        Err(e) => Err(e),
    };
    observe("delete", &result);
    result?;
    Ok(StatusCode::NO_CONTENT)
}

/// `attachment` disposition with an ASCII fallback name and, when needed,
/// the RFC 5987 UTF-8 form.
fn content_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut value = format!("attachment; filename=\"{fallback}\"");
    if !filename.is_ascii() {
        value.push_str("; filename*=UTF-8''");
        for byte in filename.bytes() {
            if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
                value.push(char::from(byte));
            } else {
                let _ = write!(value, "%{byte:02X}");
            }
        }
    }

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
