//! E2E tests for upload, gated download, and soft delete.
//!
//! Test naming: `test_<feature>_<scenario>_<expected_result>`

use file_service::config::UploadSettings;
use file_service::repositories::files::memory::InMemoryFileRepository;
use file_service::routes::{build_routes, AppState};
use file_service::services::object_store::memory::InMemoryObjectStore;
use file_service::services::FileService;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

struct TestFileServer {
    addr: SocketAddr,
    store: Arc<InMemoryObjectStore>,
    handle: JoinHandle<()>,
}

impl TestFileServer {
    async fn spawn_with(settings: UploadSettings) -> Result<Self, anyhow::Error> {
        let store = Arc::new(InMemoryObjectStore::new());
        let service = FileService::new(
            Arc::new(InMemoryFileRepository::new()),
            store.clone(),
            settings,
        );
        service.ensure_buckets().await?;

        let app = build_routes(
            Arc::new(AppState {
                files: Arc::new(service),
            }),
            None,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self { addr, store, handle })
    }

    async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(UploadSettings::default()).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestFileServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn file_part(name: &str, mime: &str, data: &'static [u8]) -> Result<Part, anyhow::Error> {
    Ok(Part::bytes(data).file_name(name.to_string()).mime_str(mime)?)
}

async fn upload(
    server: &TestFileServer,
    user: Uuid,
    form: Form,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(reqwest::Client::new()
        .post(server.endpoint("/api/v1/files"))
        .header("X-User-Id", user.to_string())
        .header("X-User-Role", "instructor")
        .multipart(form)
        .send()
        .await?)
}

#[tokio::test]
async fn test_bucket_download_with_other_bucket_returns_404() -> Result<(), anyhow::Error> {
    let server = TestFileServer::spawn().await?;
    let user = Uuid::new_v4();

    let form = Form::new()
        .part("file", file_part("cover.png", "image/png", b"png-bytes")?)
        .text("bucket_name", "course-thumbnails");
    let response = upload(&server, user, form).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await?;
    assert_eq!(body["bucket_name"], "course-thumbnails");
    let id = body["id"].as_str().unwrap_or_default().to_string();

    let client = reqwest::Client::new();
    let wrong = client
        .get(server.endpoint(&format!("/api/v1/buckets/course-videos/files/{id}/download")))
        .send()
        .await?;
    assert_eq!(wrong.status(), StatusCode::NOT_FOUND);

    let right = client
        .get(server.endpoint(&format!(
            "/api/v1/buckets/course-thumbnails/files/{id}/download"
        )))
        .send()
        .await?;
    assert_eq!(right.status(), StatusCode::OK);
    assert_eq!(right.headers()["content-type"], "image/png");
    assert_eq!(
        right.headers()["content-disposition"],
        "attachment; filename=\"cover.png\""
    );
    assert_eq!(right.bytes().await?.as_ref(), b"png-bytes");
    Ok(())
}

#[tokio::test]
async fn test_upload_routes_by_tag_and_lists_for_uploader() -> Result<(), anyhow::Error> {
    let server = TestFileServer::spawn().await?;
    let user = Uuid::new_v4();

    let form = Form::new()
        .part("file", file_part("Lecture.MP4", "application/octet-stream", b"mp4")?)
        .text("tags", "Recording, week-2");
    let response = upload(&server, user, form).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await?;
    assert_eq!(body["bucket_name"], "zoom-recordings");
    assert_eq!(body["tags"], serde_json::json!(["recording", "week-2"]));
    let stored = body["stored_filename"].as_str().unwrap_or_default();
    assert!(stored.ends_with(".mp4"));
    assert!(server.store.object("zoom-recordings", stored).is_some());
    assert!(body.get("deleted_at").is_none());

    let listed: Value = reqwest::Client::new()
        .get(server.endpoint("/api/v1/files"))
        .header("X-User-Id", user.to_string())
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let other: Value = reqwest::Client::new()
        .get(server.endpoint("/api/v1/files"))
        .header("X-User-Id", Uuid::new_v4().to_string())
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(other.as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn test_upload_unknown_bucket_returns_400() -> Result<(), anyhow::Error> {
    let server = TestFileServer::spawn().await?;
    let form = Form::new()
        .part("file", file_part("a.txt", "text/plain", b"hello")?)
        .text("bucket_name", "backups");

    let response = upload(&server, Uuid::new_v4(), form).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.store.object_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_upload_over_limit_returns_413() -> Result<(), anyhow::Error> {
    let server = TestFileServer::spawn_with(UploadSettings {
        max_upload_bytes: 8,
        ..UploadSettings::default()
    })
    .await?;
    let form = Form::new().part("file", file_part("big.txt", "text/plain", b"0123456789")?);

    let response = upload(&server, Uuid::new_v4(), form).await?;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "PAYLOAD_TOO_LARGE");
    assert_eq!(server.store.object_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_upload_without_identity_returns_401() -> Result<(), anyhow::Error> {
    let server = TestFileServer::spawn().await?;
    let form = Form::new().part("file", file_part("a.txt", "text/plain", b"hello")?);

    let response = reqwest::Client::new()
        .post(server.endpoint("/api/v1/files"))
        .multipart(form)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_deleted_file_hidden_everywhere() -> Result<(), anyhow::Error> {
    let server = TestFileServer::spawn().await?;
    let user = Uuid::new_v4();
    let form = Form::new().part("file", file_part("notes.pdf", "application/pdf", b"%PDF")?);
    let body: Value = upload(&server, user, form).await?.json().await?;
    let id = body["id"].as_str().unwrap_or_default().to_string();

    let client = reqwest::Client::new();
    let presigned: Value = client
        .get(server.endpoint(&format!("/api/v1/files/{id}/presigned-url")))
        .send()
        .await?
        .json()
        .await?;
    assert!(presigned["url"].as_str().unwrap_or_default().contains("general-files"));

    let forbidden = client
        .delete(server.endpoint(&format!("/api/v1/files/{id}")))
        .header("X-User-Id", Uuid::new_v4().to_string())
        .send()
        .await?;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let deleted = client
        .delete(server.endpoint(&format!("/api/v1/files/{id}")))
        .header("X-User-Id", user.to_string())
        .send()
        .await?;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    for path in [
        format!("/api/v1/files/{id}"),
        format!("/api/v1/files/{id}/download"),
        format!("/api/v1/files/{id}/presigned-url"),
        format!("/api/v1/buckets/general-files/files/{id}/download"),
    ] {
        let response = client.get(server.endpoint(&path)).send().await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }
    Ok(())
}
