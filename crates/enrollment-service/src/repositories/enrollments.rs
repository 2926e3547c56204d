//! Set-shaped projection updates over `enrollments`.

use crate::errors::ProjectionError;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Which projected column an update targets, and the key it is matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectedName {
    StudentUsername,
    CourseName,
    OfferingName,
}

impl ProjectedName {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectedName::StudentUsername => "student_username",
            ProjectedName::CourseName => "course_name",
            ProjectedName::OfferingName => "course_offering_name",
        }
    }

    fn update_sql(self) -> &'static str {
        match self {
            ProjectedName::StudentUsername => {
                "UPDATE enrollments SET student_username = $1, updated_at = NOW() WHERE student_id = $2"
            }
            ProjectedName::CourseName => {
                "UPDATE enrollments SET course_name = $1, updated_at = NOW() WHERE course_id = $2"
            }
            ProjectedName::OfferingName => {
                "UPDATE enrollments SET course_offering_name = $1, updated_at = NOW() WHERE course_offering_id = $2"
            }
        }
    }
}

#[async_trait]
pub trait EnrollmentProjectionStore: Send + Sync {
    /// Overwrite `column` on every enrollment keyed by `subject_id`.
    /// Returns the number of rows touched.
    async fn set_name(
        &self,
        column: ProjectedName,
        subject_id: Uuid,
        value: &str,
    ) -> Result<u64, ProjectionError>;
}

#[derive(Clone)]
pub struct PgEnrollmentProjectionStore {
    pool: PgPool,
}

impl PgEnrollmentProjectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnrollmentProjectionStore for PgEnrollmentProjectionStore {
    async fn set_name(
        &self,
        column: ProjectedName,
        subject_id: Uuid,
        value: &str,
    ) -> Result<u64, ProjectionError> {
        let result = sqlx::query(column.update_sql())
            .bind(value)
            .bind(subject_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// In-memory enrollment table for tests.
pub mod memory {
    use super::*;
    use crate::models::Enrollment;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryEnrollmentProjectionStore {
        rows: Mutex<HashMap<Uuid, Enrollment>>,
        fail: AtomicBool,
    }

    impl InMemoryEnrollmentProjectionStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failure(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        /// Seed an enrollment with placeholder projected names.
        pub async fn enroll(
            &self,
            student_id: Uuid,
            course_id: Uuid,
            course_offering_id: Uuid,
        ) -> Uuid {
            let row = Enrollment {
                id: Uuid::new_v4(),
                student_id,
                student_username: "old".to_string(),
                course_id,
                course_name: "old".to_string(),
                course_offering_id,
                course_offering_name: "old".to_string(),
                status: "active".to_string(),
                updated_at: Utc::now(),
            };
            let id = row.id;
            self.rows.lock().await.insert(id, row);
            id
        }

        pub async fn get(&self, id: Uuid) -> Option<Enrollment> {
            self.rows.lock().await.get(&id).cloned()
        }

        pub async fn all(&self) -> Vec<Enrollment> {
            let mut rows: Vec<_> = self.rows.lock().await.values().cloned().collect();
            rows.sort_by_key(|r| r.id);
            rows
        }
    }

    #[async_trait]
    impl EnrollmentProjectionStore for InMemoryEnrollmentProjectionStore {
        async fn set_name(
            &self,
            column: ProjectedName,
            subject_id: Uuid,
            value: &str,
        ) -> Result<u64, ProjectionError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProjectionError::Database("simulated outage".to_string()));
            }

            let mut rows = self.rows.lock().await;
            let mut touched = 0;
            for row in rows.values_mut() {
                let (key, target) = match column {
                    ProjectedName::StudentUsername => (row.student_id, &mut row.student_username),
                    ProjectedName::CourseName => (row.course_id, &mut row.course_name),
                    ProjectedName::OfferingName => {
                        (row.course_offering_id, &mut row.course_offering_name)
                    }
                };
                if key == subject_id {
                    *target = value.to_string();
                    row.updated_at = Utc::now();
                    touched += 1;
                }
            }
            Ok(touched)
        }
    }
}
