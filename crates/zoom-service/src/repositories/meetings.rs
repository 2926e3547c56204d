//! Meeting repository.
//!
//! `zoom_meetings` holds one row per section module; a unique index on
//! `section_module_id` backs the one-meeting-per-module rule when two
//! creates race past the service-level check.

use crate::errors::ZoomError;
use crate::models::{Meeting, MeetingChanges, NewMeeting};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait MeetingRepository: Send + Sync {
    /// A second meeting for the same module yields [`ZoomError::Conflict`].
    async fn insert(&self, meeting: NewMeeting) -> Result<Meeting, ZoomError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Meeting>, ZoomError>;

    async fn find_by_module(&self, section_module_id: Uuid) -> Result<Option<Meeting>, ZoomError>;

    /// Returns `None` when the meeting does not exist.
    async fn update(&self, id: Uuid, changes: MeetingChanges) -> Result<Option<Meeting>, ZoomError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, ZoomError>;
}

const MEETING_COLUMNS: &str = "id, section_module_id, zoom_meeting_id, topic, agenda, \
     start_time, duration_minutes, timezone, join_url, start_url, passcode, created_by, \
     created_at, updated_at";

#[derive(Clone)]
pub struct PgMeetingRepository {
    pool: PgPool,
}

impl PgMeetingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MeetingRow {
    id: Uuid,
    section_module_id: Uuid,
    zoom_meeting_id: String,
    topic: String,
    agenda: Option<String>,
    start_time: Option<chrono::DateTime<chrono::Utc>>,
    duration_minutes: Option<i32>,
    timezone: Option<String>,
    join_url: String,
    start_url: String,
    passcode: Option<String>,
    created_by: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<MeetingRow> for Meeting {
    fn from(row: MeetingRow) -> Self {
        Meeting {
            id: row.id,
            section_module_id: row.section_module_id,
            zoom_meeting_id: row.zoom_meeting_id,
            topic: row.topic,
            agenda: row.agenda,
            start_time: row.start_time,
            duration_minutes: row.duration_minutes,
            timezone: row.timezone,
            join_url: row.join_url,
            start_url: row.start_url,
            passcode: row.passcode,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl MeetingRepository for PgMeetingRepository {
    async fn insert(&self, meeting: NewMeeting) -> Result<Meeting, ZoomError> {
        let row = sqlx::query_as::<_, MeetingRow>(&format!(
            r#"
            INSERT INTO zoom_meetings (id, section_module_id, zoom_meeting_id, topic, agenda,
                                       start_time, duration_minutes, timezone, join_url,
                                       start_url, passcode, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {MEETING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(meeting.section_module_id)
        .bind(&meeting.zoom_meeting_id)
        .bind(&meeting.topic)
        .bind(&meeting.agenda)
        .bind(meeting.start_time)
        .bind(meeting.duration_minutes)
        .bind(&meeting.timezone)
        .bind(&meeting.join_url)
        .bind(&meeting.start_url)
        .bind(&meeting.passcode)
        .bind(meeting.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Meeting>, ZoomError> {
        let row = sqlx::query_as::<_, MeetingRow>(&format!(
            "SELECT {MEETING_COLUMNS} FROM zoom_meetings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Meeting::from))
    }

    async fn find_by_module(&self, section_module_id: Uuid) -> Result<Option<Meeting>, ZoomError> {
        let row = sqlx::query_as::<_, MeetingRow>(&format!(
            "SELECT {MEETING_COLUMNS} FROM zoom_meetings WHERE section_module_id = $1"
        ))
        .bind(section_module_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Meeting::from))
    }

    async fn update(&self, id: Uuid, changes: MeetingChanges) -> Result<Option<Meeting>, ZoomError> {
        let row = sqlx::query_as::<_, MeetingRow>(&format!(
            r#"
            UPDATE zoom_meetings
            SET topic = COALESCE($2, topic),
                agenda = COALESCE($3, agenda),
                start_time = COALESCE($4, start_time),
                duration_minutes = COALESCE($5, duration_minutes),
                timezone = COALESCE($6, timezone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {MEETING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.topic)
        .bind(&changes.agenda)
        .bind(changes.start_time)
        .bind(changes.duration_minutes)
        .bind(&changes.timezone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Meeting::from))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ZoomError> {
        let result = sqlx::query("DELETE FROM zoom_meetings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory meeting store for tests.
pub mod memory {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryMeetingRepository {
        meetings: Mutex<HashMap<Uuid, Meeting>>,
    }

    impl InMemoryMeetingRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn count(&self) -> usize {
            self.meetings.lock().await.len()
        }
    }

    #[async_trait]
    impl MeetingRepository for InMemoryMeetingRepository {
        async fn insert(&self, new: NewMeeting) -> Result<Meeting, ZoomError> {
            let mut meetings = self.meetings.lock().await;
            if meetings
                .values()
                .any(|m| m.section_module_id == new.section_module_id)
            {
                return Err(ZoomError::Conflict(
                    "a meeting already exists for this module".to_string(),
                ));
            }

            let now = Utc::now();
            let meeting = Meeting {
                id: Uuid::new_v4(),
                section_module_id: new.section_module_id,
                zoom_meeting_id: new.zoom_meeting_id,
                topic: new.topic,
                agenda: new.agenda,
                start_time: new.start_time,
                duration_minutes: new.duration_minutes,
                timezone: new.timezone,
                join_url: new.join_url,
                start_url: new.start_url,
                passcode: new.passcode,
                created_by: new.created_by,
                created_at: now,
                updated_at: now,
            };
            meetings.insert(meeting.id, meeting.clone());
            Ok(meeting)
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Meeting>, ZoomError> {
            Ok(self.meetings.lock().await.get(&id).cloned())
        }

        async fn find_by_module(
            &self,
            section_module_id: Uuid,
        ) -> Result<Option<Meeting>, ZoomError> {
            Ok(self
                .meetings
                .lock()
                .await
                .values()
                .find(|m| m.section_module_id == section_module_id)
                .cloned())
        }

        async fn update(
            &self,
            id: Uuid,
            changes: MeetingChanges,
        ) -> Result<Option<Meeting>, ZoomError> {
            let mut meetings = self.meetings.lock().await;
            let Some(meeting) = meetings.get_mut(&id) else {
                return Ok(None);
            };
            if let Some(topic) = changes.topic {
                meeting.topic = topic;
            }
            if let Some(agenda) = changes.agenda {
                meeting.agenda = Some(agenda);
            }
            if let Some(start_time) = changes.start_time {
                meeting.start_time = Some(start_time);
            }
            if let Some(duration) = changes.duration_minutes {
                meeting.duration_minutes = Some(duration);
            }
            if let Some(timezone) = changes.timezone {
                meeting.timezone = Some(timezone);
            }
            meeting.updated_at = Utc::now();
            Ok(Some(meeting.clone()))
        }

        async fn delete(&self, id: Uuid) -> Result<bool, ZoomError> {
            Ok(self.meetings.lock().await.remove(&id).is_some())
        }
    }

}
