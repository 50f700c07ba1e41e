use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use time::{Date, PrimitiveDateTime};

use crate::db::models::{ExamSubject, Examination, InvigilatedSession};
use crate::db::types::ExamStatus;
use crate::repositories::ExamRepository;
use crate::services::errors::StoreError;

pub(crate) const COLUMNS: &str = "\
    id, school_id, name, code, exam_type, class_name, sections, description, \
    exam_start_date, exam_end_date, status, created_by, created_at, updated_at";

pub(crate) const SUBJECT_COLUMNS: &str = "\
    id, examination_id, position, name, exam_date, start_time, duration_minutes, room, \
    max_marks, total_marks, passing_marks, teacher_id, invigilators";

pub(crate) struct PgExamRepository {
    pool: PgPool,
}

impl PgExamRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_subjects(&self, exams: &mut [Examination]) -> Result<(), sqlx::Error> {
        if exams.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = exams.iter().map(|exam| exam.id.clone()).collect();

        let subjects = sqlx::query_as::<_, ExamSubject>(&format!(
            "SELECT {SUBJECT_COLUMNS}
             FROM exam_subjects
             WHERE examination_id = ANY($1)
             ORDER BY examination_id, position"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<String, Vec<ExamSubject>> = HashMap::new();
        for subject in subjects {
            grouped.entry(subject.examination_id.clone()).or_default().push(subject);
        }
        for exam in exams.iter_mut() {
            exam.subjects = grouped.remove(&exam.id).unwrap_or_default();
        }
        Ok(())
    }
}

async fn insert_subjects(
    tx: &mut Transaction<'_, Postgres>,
    exam: &Examination,
) -> Result<(), sqlx::Error> {
    for subject in &exam.subjects {
        sqlx::query(
            "INSERT INTO exam_subjects (
                id, examination_id, position, name, exam_date, start_time, duration_minutes,
                room, max_marks, total_marks, passing_marks, teacher_id, invigilators
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)",
        )
        .bind(&subject.id)
        .bind(&exam.id)
        .bind(subject.position)
        .bind(&subject.name)
        .bind(subject.exam_date)
        .bind(subject.start_time)
        .bind(subject.duration_minutes)
        .bind(&subject.room)
        .bind(subject.max_marks)
        .bind(subject.total_marks)
        .bind(subject.passing_marks)
        .bind(&subject.teacher_id)
        .bind(&subject.invigilators)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl ExamRepository for PgExamRepository {
    async fn insert(&self, exam: &Examination) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO examinations (
                id, school_id, name, code, exam_type, class_name, sections, description,
                exam_start_date, exam_end_date, status, created_by, created_at, updated_at
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)",
        )
        .bind(&exam.id)
        .bind(&exam.school_id)
        .bind(&exam.name)
        .bind(&exam.code)
        .bind(exam.exam_type)
        .bind(&exam.class_name)
        .bind(&exam.sections)
        .bind(&exam.description)
        .bind(exam.exam_start_date)
        .bind(exam.exam_end_date)
        .bind(exam.status)
        .bind(&exam.created_by)
        .bind(exam.created_at)
        .bind(exam.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_subjects(&mut tx, exam).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace(&self, exam: &Examination) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE examinations
             SET name = $1,
                 code = $2,
                 exam_type = $3,
                 class_name = $4,
                 sections = $5,
                 description = $6,
                 exam_start_date = $7,
                 exam_end_date = $8,
                 updated_at = $9
             WHERE id = $10 AND school_id = $11",
        )
        .bind(&exam.name)
        .bind(&exam.code)
        .bind(exam.exam_type)
        .bind(&exam.class_name)
        .bind(&exam.sections)
        .bind(&exam.description)
        .bind(exam.exam_start_date)
        .bind(exam.exam_end_date)
        .bind(exam.updated_at)
        .bind(&exam.id)
        .bind(&exam.school_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM exam_subjects WHERE examination_id = $1")
            .bind(&exam.id)
            .execute(&mut *tx)
            .await?;
        insert_subjects(&mut tx, exam).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, school_id: &str, id: &str) -> Result<Option<Examination>, StoreError> {
        let exam = sqlx::query_as::<_, Examination>(&format!(
            "SELECT {COLUMNS} FROM examinations WHERE id = $1 AND school_id = $2"
        ))
        .bind(id)
        .bind(school_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(exam) = exam else {
            return Ok(None);
        };
        let mut exams = [exam];
        self.attach_subjects(&mut exams).await?;
        let [exam] = exams;
        Ok(Some(exam))
    }

    async fn list(
        &self,
        school_id: &str,
        status: Option<ExamStatus>,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Examination>, i64), StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COLUMNS} FROM examinations WHERE school_id = "
        ));
        builder.push_bind(school_id);
        if let Some(status) = status {
            builder.push(" AND status = ");
            builder.push_bind(status);
        }
        builder.push(" ORDER BY exam_start_date DESC, created_at DESC OFFSET ");
        builder.push_bind(skip.max(0));
        builder.push(" LIMIT ");
        builder.push_bind(limit.clamp(1, 1000));

        let mut exams = builder.build_query_as::<Examination>().fetch_all(&self.pool).await?;
        self.attach_subjects(&mut exams).await?;

        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM examinations WHERE school_id = ",
        );
        count.push_bind(school_id);
        if let Some(status) = status {
            count.push(" AND status = ");
            count.push_bind(status);
        }
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok((exams, total))
    }

    async fn list_for_school(&self, school_id: &str) -> Result<Vec<Examination>, StoreError> {
        let mut exams = sqlx::query_as::<_, Examination>(&format!(
            "SELECT {COLUMNS} FROM examinations WHERE school_id = $1 \
             ORDER BY exam_start_date DESC, created_at DESC"
        ))
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;
        self.attach_subjects(&mut exams).await?;
        Ok(exams)
    }

    async fn update_status(
        &self,
        school_id: &str,
        id: &str,
        status: ExamStatus,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE examinations SET status = $1, updated_at = $2
             WHERE id = $3 AND school_id = $4",
        )
        .bind(status)
        .bind(now)
        .bind(id)
        .bind(school_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, school_id: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM examinations WHERE id = $1 AND school_id = $2")
            .bind(id)
            .bind(school_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn sessions_for_teacher(
        &self,
        school_id: &str,
        teacher_id: &str,
        date: Date,
    ) -> Result<Vec<InvigilatedSession>, StoreError> {
        let sessions = sqlx::query_as::<_, InvigilatedSession>(
            "SELECT e.id AS examination_id,
                    e.name AS examination_name,
                    s.id AS subject_id,
                    s.name AS subject_name,
                    $2::text AS teacher_id,
                    s.exam_date,
                    s.start_time,
                    s.duration_minutes
             FROM exam_subjects s
             JOIN examinations e ON e.id = s.examination_id
             WHERE e.school_id = $1
               AND s.exam_date = $3
               AND s.invigilators @> jsonb_build_array(jsonb_build_object('teacher_id', $2::text))
             ORDER BY s.start_time",
        )
        .bind(school_id)
        .bind(teacher_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }
}
