//! Meeting provider HTTP client.
//!
//! Talks to the provider's REST API with a server-to-server OAuth app: an
//! access token is obtained with the account-credentials grant and cached
//! until five minutes before it expires.
//!
//! # Security
//!
//! - Client secret and access token are held as `SecretString`
//! - Host start URLs and passcodes are redacted from `Debug`
//! - Provider error bodies are logged server-side, never returned

use crate::config::ZoomSettings;
use crate::errors::ZoomError;
use crate::models::{string_or_number, MeetingSettings};
use crate::observability::record_provider_call;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::secret::{ExposeSecret, SecretString};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Default timeout for provider requests in seconds.
const PROVIDER_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Tokens are refreshed this long before the provider expires them.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Provider meeting type for a meeting with a fixed start time.
pub const MEETING_TYPE_SCHEDULED: u8 = 2;

/// Provider meeting type for a meeting that starts on demand.
pub const MEETING_TYPE_INSTANT: u8 = 1;

/// Longest provider error body kept for logs.
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Create or patch body in the provider's vocabulary. Unset fields are
/// omitted so a patch only touches what was supplied.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ProviderMeetingRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub meeting_type: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agenda: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<MeetingSettings>,
}

/// Meeting as returned by the provider's create call.
#[derive(Clone, Deserialize)]
pub struct ProviderMeeting {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub topic: String,
    pub join_url: String,
    pub start_url: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: Option<i32>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl fmt::Debug for ProviderMeeting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderMeeting")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("join_url", &self.join_url)
            .field("start_url", &"[REDACTED]")
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("start_time", &self.start_time)
            .field("duration", &self.duration)
            .finish()
    }
}

/// The external meeting provider.
#[async_trait]
pub trait MeetingProvider: Send + Sync {
    async fn create_meeting(
        &self,
        request: &ProviderMeetingRequest,
    ) -> Result<ProviderMeeting, ZoomError>;

    /// A meeting unknown to the provider yields [`ZoomError::NotFound`].
    async fn update_meeting(
        &self,
        meeting_id: &str,
        request: &ProviderMeetingRequest,
    ) -> Result<(), ZoomError>;

    /// Deleting a meeting the provider no longer knows succeeds.
    async fn delete_meeting(&self, meeting_id: &str) -> Result<(), ZoomError>;
}

/// OAuth token response from the provider.
#[derive(Deserialize)]
struct OAuthResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: SecretString,
    refresh_at: Instant,
}

/// HTTP client for the provider REST API.
pub struct ZoomClient {
    http: Client,
    settings: ZoomSettings,
    token: Mutex<Option<CachedToken>>,
}

impl ZoomClient {
    /// # Errors
    ///
    /// Returns `ZoomError::Internal` if the HTTP client cannot be built.
    pub fn new(settings: ZoomSettings) -> Result<Self, ZoomError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "zoom.provider", error = %e, "Failed to build HTTP client");
                ZoomError::Internal
            })?;

        Ok(Self {
            http,
            settings,
            token: Mutex::new(None),
        })
    }

    /// Cached access token, fetching a new one when absent or due.
    ///
    /// The lock is held across the fetch so concurrent callers share one
    /// token request.
    async fn access_token(&self) -> Result<SecretString, ZoomError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let response = self.fetch_token().await?;
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        let value = SecretString::from(response.access_token);
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        debug!(
            target: "zoom.provider",
            expires_in = response.expires_in,
            "Provider access token acquired"
        );
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    #[instrument(skip_all, name = "zoom.provider.token")]
    async fn fetch_token(&self) -> Result<OAuthResponse, ZoomError> {
        let start = std::time::Instant::now();
        let response = self
            .http
            .post(&self.settings.oauth_url)
            .basic_auth(
                &self.settings.client_id,
                Some(self.settings.client_secret.expose_secret()),
            )
            .query(&[
                ("grant_type", "account_credentials"),
                ("account_id", self.settings.account_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                record_provider_call("token", "unavailable", start.elapsed());
                warn!(target: "zoom.provider", error = %e, "Token request failed");
                ZoomError::ProviderUnavailable(format!("token request failed: {e}"))
            })?;

        let status = response.status();
        record_provider_call("token", outcome_for(status), start.elapsed());
        if !status.is_success() {
            let body = error_body(response).await;
            warn!(target: "zoom.provider", status = %status, body = %body, "Token request rejected");
            return Err(ZoomError::Provider(format!(
                "token request returned {status}"
            )));
        }

        response.json::<OAuthResponse>().await.map_err(|e| {
            warn!(target: "zoom.provider", error = %e, "Invalid token response");
            ZoomError::Provider(format!("invalid token response: {e}"))
        })
    }

    /// Send an authorized request. A 401 drops the cached token and retries
    /// once with a fresh one.
    async fn execute<F>(&self, operation: &'static str, build: F) -> Result<Response, ZoomError>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let start = std::time::Instant::now();
        let mut retried = false;
        loop {
            let token = self.access_token().await?;
            let response = build(token.expose_secret()).send().await.map_err(|e| {
                record_provider_call(operation, "unavailable", start.elapsed());
                warn!(target: "zoom.provider", operation, error = %e, "Provider request failed");
                ZoomError::ProviderUnavailable(format!("{operation} request failed: {e}"))
            })?;

            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                debug!(target: "zoom.provider", operation, "Token rejected, refreshing");
                self.invalidate_token().await;
                retried = true;
                continue;
            }

            record_provider_call(operation, outcome_for(response.status()), start.elapsed());
            return Ok(response);
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url, path)
    }
}

#[async_trait]
impl MeetingProvider for ZoomClient {
    #[instrument(skip_all, name = "zoom.provider.create")]
    async fn create_meeting(
        &self,
        request: &ProviderMeetingRequest,
    ) -> Result<ProviderMeeting, ZoomError> {
        let url = self.url("/users/me/meetings");
        let response = self
            .execute("create", |token| self.http.post(&url).bearer_auth(token).json(request))
            .await?;

        if !response.status().is_success() {
            return Err(provider_error("create", response).await);
        }

        let meeting = response.json::<ProviderMeeting>().await.map_err(|e| {
            warn!(target: "zoom.provider", error = %e, "Invalid create response");
            ZoomError::Provider(format!("invalid create response: {e}"))
        })?;

        info!(target: "zoom.provider", zoom_meeting_id = %meeting.id, "Provider meeting created");
        Ok(meeting)
    }

    #[instrument(skip_all, name = "zoom.provider.update", fields(zoom_meeting_id = %meeting_id))]
    async fn update_meeting(
        &self,
        meeting_id: &str,
        request: &ProviderMeetingRequest,
    ) -> Result<(), ZoomError> {
        let url = self.url(&format!("/meetings/{meeting_id}"));
        let response = self
            .execute("update", |token| self.http.patch(&url).bearer_auth(token).json(request))
            .await?;

        if !response.status().is_success() {
            return Err(provider_error("update", response).await);
        }
        Ok(())
    }

    #[instrument(skip_all, name = "zoom.provider.delete", fields(zoom_meeting_id = %meeting_id))]
    async fn delete_meeting(&self, meeting_id: &str) -> Result<(), ZoomError> {
        let url = self.url(&format!("/meetings/{meeting_id}"));
        let response = self
            .execute("delete", |token| self.http.delete(&url).bearer_auth(token))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            info!(target: "zoom.provider", "Provider meeting already gone");
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(provider_error("delete", response).await);
        }
        Ok(())
    }
}

fn outcome_for(status: StatusCode) -> &'static str {
    if status.is_success() {
        "success"
    } else if status.is_client_error() {
        "client_error"
    } else {
        "server_error"
    }
}

async fn error_body(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

async fn provider_error(operation: &'static str, response: Response) -> ZoomError {
    let status = response.status();
    let body = error_body(response).await;
    warn!(target: "zoom.provider", operation, status = %status, body = %body, "Provider rejected request");

    if status == StatusCode::NOT_FOUND {
        ZoomError::NotFound("meeting not found at provider".to_string())
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ZoomError::ProviderUnavailable(format!("{operation} returned {status}"))
    } else {
        ZoomError::Provider(format!("{operation} returned {status}"))
    }
}

/// Mock provider for unit and integration tests.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// How the mock should fail.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MockFailure {
        Unavailable,
        Rejected,
        NotFound,
    }

    impl MockFailure {
        fn error(self) -> ZoomError {
            match self {
                MockFailure::Unavailable => {
                    ZoomError::ProviderUnavailable("mock provider unavailable".to_string())
                }
                MockFailure::Rejected => ZoomError::Provider("mock provider rejected".to_string()),
                MockFailure::NotFound => {
                    ZoomError::NotFound("meeting not found at provider".to_string())
                }
            }
        }
    }

    #[derive(Default)]
    struct Calls {
        created: Vec<ProviderMeetingRequest>,
        updated: Vec<(String, ProviderMeetingRequest)>,
        deleted: Vec<String>,
    }

    /// Records calls and hands out sequential numeric meeting ids.
    pub struct MockMeetingProvider {
        next_id: AtomicU64,
        failure: std::sync::Mutex<Option<MockFailure>>,
        calls: std::sync::Mutex<Calls>,
    }

    impl Default for MockMeetingProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockMeetingProvider {
        pub fn new() -> Self {
            Self {
                next_id: AtomicU64::new(85_000_000_001),
                failure: std::sync::Mutex::new(None),
                calls: std::sync::Mutex::new(Calls::default()),
            }
        }

        /// Fail every call with `failure` until cleared with `None`.
        pub fn set_failure(&self, failure: Option<MockFailure>) {
            *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = failure;
        }

        pub fn created(&self) -> Vec<ProviderMeetingRequest> {
            self.lock_calls().created.clone()
        }

        pub fn updated(&self) -> Vec<(String, ProviderMeetingRequest)> {
            self.lock_calls().updated.clone()
        }

        pub fn deleted(&self) -> Vec<String> {
            self.lock_calls().deleted.clone()
        }

        fn lock_calls(&self) -> std::sync::MutexGuard<'_, Calls> {
            self.calls.lock().unwrap_or_else(|e| e.into_inner())
        }

        fn check_failure(&self) -> Result<(), ZoomError> {
            match *self.failure.lock().unwrap_or_else(|e| e.into_inner()) {
                Some(failure) => Err(failure.error()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl MeetingProvider for MockMeetingProvider {
        async fn create_meeting(
            &self,
            request: &ProviderMeetingRequest,
        ) -> Result<ProviderMeeting, ZoomError> {
            self.check_failure()?;
            self.lock_calls().created.push(request.clone());

            let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
            Ok(ProviderMeeting {
                join_url: format!("https://zoom.test/j/{id}"),
                start_url: format!("https://zoom.test/s/{id}?zak=mock"),
                id,
                topic: request.topic.clone().unwrap_or_default(),
                password: Some("123456".to_string()),
                start_time: request.start_time,
                duration: request.duration,
                timezone: request.timezone.clone(),
            })
        }

        async fn update_meeting(
            &self,
            meeting_id: &str,
            request: &ProviderMeetingRequest,
        ) -> Result<(), ZoomError> {
            self.check_failure()?;
            self.lock_calls()
                .updated
                .push((meeting_id.to_string(), request.clone()));
            Ok(())
        }

        async fn delete_meeting(&self, meeting_id: &str) -> Result<(), ZoomError> {
            self.check_failure()?;
            self.lock_calls().deleted.push(meeting_id.to_string());
            Ok(())
        }
    }
}
