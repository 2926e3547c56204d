//! E2E tests for the meeting API against a stubbed provider.
//!
//! Test naming: `test_<feature>_<scenario>_<expected_result>`

use common::events::{routing, InMemoryBus};
use common::secret::SecretString;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zoom_service::config::ZoomSettings;
use zoom_service::repositories::meetings::memory::InMemoryMeetingRepository;
use zoom_service::routes::{build_routes, AppState};
use zoom_service::services::{MeetingService, ZoomClient};

struct TestZoomServer {
    addr: SocketAddr,
    provider: MockServer,
    meetings: Arc<InMemoryMeetingRepository>,
    bus: InMemoryBus,
    handle: JoinHandle<()>,
}

impl TestZoomServer {
    async fn spawn() -> Result<Self, anyhow::Error> {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "provider-token",
                "token_type": "bearer",
                "expires_in": 3600
            })))
            .mount(&provider)
            .await;

        let settings = ZoomSettings {
            account_id: "account-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: SecretString::from("secret-1".to_string()),
            base_url: format!("{}/v2", provider.uri()),
            oauth_url: format!("{}/oauth/token", provider.uri()),
        };

        let meetings = Arc::new(InMemoryMeetingRepository::new());
        let bus = InMemoryBus::new();
        let service = MeetingService::new(
            meetings.clone(),
            Arc::new(ZoomClient::new(settings)?),
            Arc::new(bus.clone()),
        );
        let app = build_routes(
            Arc::new(AppState {
                meetings: Arc::new(service),
            }),
            None,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server failed");
        });

        Ok(Self {
            addr,
            provider,
            meetings,
            bus,
            handle,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestZoomServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

const INSTRUCTOR_ID: &str = "7d0f4c1e-6a55-4c3b-9b43-2f6f1c9f0a11";

fn provider_meeting(id: u64) -> Value {
    json!({
        "id": id,
        "topic": "Week 1 live session",
        "join_url": format!("https://zoom.test/j/{id}"),
        "start_url": format!("https://zoom.test/s/{id}?zak=host"),
        "password": "abc123",
        "start_time": "2026-11-02T15:00:00Z",
        "duration": 60,
        "timezone": "UTC"
    })
}

fn create_body(section_module_id: Uuid) -> Value {
    json!({
        "section_module_id": section_module_id,
        "topic": "Week 1 live session",
        "start_time": "2026-11-02T15:00:00Z",
        "duration": 60,
        "timezone": "UTC"
    })
}

#[tokio::test]
async fn test_create_meeting_stores_and_publishes_created_event() -> Result<(), anyhow::Error> {
    let server = TestZoomServer::spawn().await?;
    Mock::given(method("POST"))
        .and(path("/v2/users/me/meetings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(provider_meeting(85_123_456_789)))
        .expect(1)
        .mount(&server.provider)
        .await;

    let module = Uuid::new_v4();
    let creator = Uuid::new_v4();
    let response = reqwest::Client::new()
        .post(server.endpoint("/api/v1/zoom/meetings"))
        .header("X-User-Id", creator.to_string())
        .json(&create_body(module))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await?;
    assert_eq!(body["section_module_id"], module.to_string());
    assert_eq!(body["zoom_meeting_id"], "85123456789");
    assert_eq!(body["join_url"], "https://zoom.test/j/85123456789");
    assert_eq!(body["created_by"], creator.to_string());
    assert_eq!(server.meetings.count().await, 1);

    let events = server.bus.published_with_key(routing::ZOOM_MEETING_CREATED);
    assert_eq!(events.len(), 1);
    let payload = events[0].payload();
    assert_eq!(payload["section_module_id"], module.to_string());
    assert_eq!(payload["zoom_meeting_id"], "85123456789");
    assert_eq!(payload["join_url"], "https://zoom.test/j/85123456789");
    assert!(events[0].persistent);

    let fetched: Value = reqwest::Client::new()
        .get(server.endpoint(&format!("/api/v1/zoom/modules/{module}/meeting")))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(fetched["id"], body["id"]);
    assert!(fetched.get("start_url").is_none());
    assert!(fetched.get("passcode").is_none());

    Ok(())
}

#[tokio::test]
async fn test_create_meeting_twice_for_module_returns_409() -> Result<(), anyhow::Error> {
    let server = TestZoomServer::spawn().await?;
    Mock::given(method("POST"))
        .and(path("/v2/users/me/meetings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(provider_meeting(85_000_000_042)))
        .expect(1)
        .mount(&server.provider)
        .await;

    let module = Uuid::new_v4();
    let client = reqwest::Client::new();
    let first = client
        .post(server.endpoint("/api/v1/zoom/meetings"))
        .header("X-User-Id", INSTRUCTOR_ID)
        .json(&create_body(module))
        .send()
        .await?;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = client
        .post(server.endpoint("/api/v1/zoom/meetings"))
        .header("X-User-Id", INSTRUCTOR_ID)
        .json(&create_body(module))
        .send()
        .await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = second.json().await?;
    assert_eq!(body["error"], "CONFLICT");

    assert_eq!(server.bus.published_with_key(routing::ZOOM_MEETING_CREATED).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_create_meeting_provider_down_returns_503_without_event() -> Result<(), anyhow::Error> {
    let server = TestZoomServer::spawn().await?;
    Mock::given(method("POST"))
        .and(path("/v2/users/me/meetings"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server.provider)
        .await;

    let response = reqwest::Client::new()
        .post(server.endpoint("/api/v1/zoom/meetings"))
        .header("X-User-Id", INSTRUCTOR_ID)
        .json(&create_body(Uuid::new_v4()))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = response.json().await?;
    assert_eq!(body["error"], "PROVIDER_UNAVAILABLE");
    assert!(!body["message"].as_str().unwrap_or_default().contains("maintenance"));
    assert_eq!(server.meetings.count().await, 0);
    assert!(server.bus.published().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_update_and_delete_meeting_reach_provider() -> Result<(), anyhow::Error> {
    let server = TestZoomServer::spawn().await?;
    Mock::given(method("POST"))
        .and(path("/v2/users/me/meetings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(provider_meeting(85_000_000_007)))
        .mount(&server.provider)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/v2/meetings/85000000007"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server.provider)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2/meetings/85000000007"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server.provider)
        .await;

    let client = reqwest::Client::new();
    let created: Value = client
        .post(server.endpoint("/api/v1/zoom/meetings"))
        .header("X-User-Id", INSTRUCTOR_ID)
        .json(&create_body(Uuid::new_v4()))
        .send()
        .await?
        .json()
        .await?;
    let id = created["id"].as_str().unwrap_or_default().to_string();

    let response = client
        .patch(server.endpoint(&format!("/api/v1/zoom/meetings/{id}")))
        .header("X-User-Id", INSTRUCTOR_ID)
        .json(&json!({ "topic": "Week 1 (moved)" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await?;
    assert_eq!(updated["topic"], "Week 1 (moved)");

    let response = client
        .delete(server.endpoint(&format!("/api/v1/zoom/meetings/{id}")))
        .header("X-User-Id", INSTRUCTOR_ID)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(server.meetings.count().await, 0);

    let response = client
        .get(server.endpoint(&format!("/api/v1/zoom/meetings/{id}")))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_get_meeting_shows_host_link_only_to_hosts() -> Result<(), anyhow::Error> {
    let server = TestZoomServer::spawn().await?;
    Mock::given(method("POST"))
        .and(path("/v2/users/me/meetings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(provider_meeting(85_000_000_099)))
        .mount(&server.provider)
        .await;

    let client = reqwest::Client::new();
    let created: Value = client
        .post(server.endpoint("/api/v1/zoom/meetings"))
        .header("X-User-Id", INSTRUCTOR_ID)
        .json(&create_body(Uuid::new_v4()))
        .send()
        .await?
        .json()
        .await?;
    let id = created["id"].as_str().unwrap_or_default().to_string();
    let url = server.endpoint(&format!("/api/v1/zoom/meetings/{id}"));

    let as_student: Value = client
        .get(&url)
        .header("X-User-Id", Uuid::new_v4().to_string())
        .header("X-User-Role", "student")
        .send()
        .await?
        .json()
        .await?;
    assert!(as_student.get("start_url").is_none());
    assert_eq!(as_student["passcode"], "abc123");
    assert_eq!(as_student["join_url"], "https://zoom.test/j/85000000099");

    let as_creator: Value = client
        .get(&url)
        .header("X-User-Id", INSTRUCTOR_ID)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(as_creator["start_url"], "https://zoom.test/s/85000000099?zak=host");
    Ok(())
}

#[tokio::test]
async fn test_mutations_without_identity_return_401() -> Result<(), anyhow::Error> {
    let server = TestZoomServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(server.endpoint("/api/v1/zoom/meetings"))
        .json(&create_body(Uuid::new_v4()))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let id = Uuid::new_v4();
    let response = client
        .patch(server.endpoint(&format!("/api/v1/zoom/meetings/{id}")))
        .json(&json!({ "topic": "x" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(server.meetings.count().await, 0);
    Ok(())
}
