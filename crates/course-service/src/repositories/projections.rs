//! Projection store for course-service.
//!
//! Each update is a single set-shaped `UPDATE` keyed on the event's subject
//! id, so replaying an event converges to the same rows.

use crate::errors::ProjectionError;
use crate::models::CONTENT_STATUS_CREATED;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait CourseProjectionStore: Send + Sync {
    /// Rename the instructor on every offering they teach. Returns rows touched.
    async fn set_instructor_username(
        &self,
        instructor_id: Uuid,
        username: &str,
    ) -> Result<u64, ProjectionError>;

    /// Point a module at its provider meeting and mark it created.
    async fn link_module_meeting(
        &self,
        section_module_id: Uuid,
        zoom_meeting_id: &str,
    ) -> Result<u64, ProjectionError>;
}

#[derive(Clone)]
pub struct PgCourseProjectionStore {
    pool: PgPool,
}

impl PgCourseProjectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CourseProjectionStore for PgCourseProjectionStore {
    async fn set_instructor_username(
        &self,
        instructor_id: Uuid,
        username: &str,
    ) -> Result<u64, ProjectionError> {
        let result = sqlx::query(
            r#"
            UPDATE course_offering_instructors
            SET instructor_username = $1, updated_at = NOW()
            WHERE instructor_id = $2
            "#,
        )
        .bind(username)
        .bind(instructor_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn link_module_meeting(
        &self,
        section_module_id: Uuid,
        zoom_meeting_id: &str,
    ) -> Result<u64, ProjectionError> {
        let result = sqlx::query(
            r#"
            UPDATE section_modules
            SET content_id = $1, content_status = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(zoom_meeting_id)
        .bind(CONTENT_STATUS_CREATED)
        .bind(section_module_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// In-memory projection store for tests.
pub mod memory {
    use super::*;
    use crate::models::{OfferingInstructor, SectionModule, CONTENT_STATUS_PENDING};
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Tables {
        instructors: HashMap<Uuid, OfferingInstructor>,
        modules: HashMap<Uuid, SectionModule>,
    }

    #[derive(Default)]
    pub struct InMemoryCourseProjectionStore {
        tables: Mutex<Tables>,
        fail: AtomicBool,
    }

    impl InMemoryCourseProjectionStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every update fail with a database error.
        pub fn set_failure(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub async fn add_instructor(
            &self,
            course_offering_id: Uuid,
            instructor_id: Uuid,
            username: &str,
        ) -> Uuid {
            let row = OfferingInstructor {
                id: Uuid::new_v4(),
                course_offering_id,
                instructor_id,
                instructor_username: username.to_string(),
                updated_at: Utc::now(),
            };
            let id = row.id;
            self.tables.lock().await.instructors.insert(id, row);
            id
        }

        pub async fn add_module(&self, section_id: Uuid, title: &str) -> Uuid {
            let row = SectionModule {
                id: Uuid::new_v4(),
                section_id,
                title: title.to_string(),
                content_id: None,
                content_status: CONTENT_STATUS_PENDING.to_string(),
                updated_at: Utc::now(),
            };
            let id = row.id;
            self.tables.lock().await.modules.insert(id, row);
            id
        }

        pub async fn instructors_for(&self, instructor_id: Uuid) -> Vec<OfferingInstructor> {
            self.tables
                .lock()
                .await
                .instructors
                .values()
                .filter(|r| r.instructor_id == instructor_id)
                .cloned()
                .collect()
        }

        pub async fn module(&self, id: Uuid) -> Option<SectionModule> {
            self.tables.lock().await.modules.get(&id).cloned()
        }

        fn check_failure(&self) -> Result<(), ProjectionError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProjectionError::Database("simulated outage".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CourseProjectionStore for InMemoryCourseProjectionStore {
        async fn set_instructor_username(
            &self,
            instructor_id: Uuid,
            username: &str,
        ) -> Result<u64, ProjectionError> {
            self.check_failure()?;
            let mut tables = self.tables.lock().await;
            let mut touched = 0;
            for row in tables
                .instructors
                .values_mut()
                .filter(|r| r.instructor_id == instructor_id)
            {
                row.instructor_username = username.to_string();
                row.updated_at = Utc::now();
                touched += 1;
            }
            Ok(touched)
        }

        async fn link_module_meeting(
            &self,
            section_module_id: Uuid,
            zoom_meeting_id: &str,
        ) -> Result<u64, ProjectionError> {
            self.check_failure()?;
            let mut tables = self.tables.lock().await;
            let Some(module) = tables.modules.get_mut(&section_module_id) else {
                return Ok(0);
            };
            module.content_id = Some(zoom_meeting_id.to_string());
            module.content_status = CONTENT_STATUS_CREATED.to_string();
            module.updated_at = Utc::now();
            Ok(1)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_instructor_rename_is_set_shaped(pool: PgPool) -> Result<(), anyhow::Error> {
        let instructor = Uuid::new_v4();
        for _ in 0..2 {
            sqlx::query(
                "INSERT INTO course_offering_instructors (id, course_offering_id, instructor_id, instructor_username) \
                 VALUES ($1, $2, $3, 'old')",
            )
            .bind(Uuid::new_v4())
            .bind(Uuid::new_v4())
            .bind(instructor)
            .execute(&pool)
            .await?;
        }

        let store = PgCourseProjectionStore::new(pool.clone());
        assert_eq!(store.set_instructor_username(instructor, "new").await?, 2);
        assert_eq!(store.set_instructor_username(instructor, "new").await?, 2);

        let names: Vec<String> = sqlx::query_scalar(
            "SELECT instructor_username FROM course_offering_instructors WHERE instructor_id = $1",
        )
        .bind(instructor)
        .fetch_all(&pool)
        .await?;
        assert_eq!(names, vec!["new", "new"]);
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_link_module_meeting(pool: PgPool) -> Result<(), anyhow::Error> {
        let module = Uuid::new_v4();
        sqlx::query("INSERT INTO section_modules (id, section_id, title) VALUES ($1, $2, 'Live')")
            .bind(module)
            .bind(Uuid::new_v4())
            .execute(&pool)
            .await?;

        let store = PgCourseProjectionStore::new(pool.clone());
        assert_eq!(store.link_module_meeting(module, "85123456789").await?, 1);
        assert_eq!(store.link_module_meeting(Uuid::new_v4(), "1").await?, 0);

        let (content_id, status): (Option<String>, String) = sqlx::query_as(
            "SELECT content_id, content_status FROM section_modules WHERE id = $1",
        )
        .bind(module)
        .fetch_one(&pool)
        .await?;
        assert_eq!(content_id.as_deref(), Some("85123456789"));
        assert_eq!(status, CONTENT_STATUS_CREATED);
        Ok(())
    }
}
