use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::models::{StudentProfile, TeacherProfile};
use crate::repositories::Directory;
use crate::services::errors::StoreError;

pub(crate) struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn find_student(
        &self,
        school_id: &str,
        id: &str,
    ) -> Result<Option<StudentProfile>, StoreError> {
        let student = sqlx::query_as::<_, StudentProfile>(
            "SELECT id, school_id, full_name, roll_number, class_name, section
             FROM students
             WHERE id = $1 AND school_id = $2",
        )
        .bind(id)
        .bind(school_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(student)
    }

    async fn find_teacher(
        &self,
        school_id: &str,
        id: &str,
    ) -> Result<Option<TeacherProfile>, StoreError> {
        let teacher = sqlx::query_as::<_, TeacherProfile>(
            "SELECT id, school_id, full_name FROM teachers WHERE id = $1 AND school_id = $2",
        )
        .bind(id)
        .bind(school_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(teacher)
    }
}
