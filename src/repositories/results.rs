use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::db::models::ResultRecord;
use crate::db::types::ApprovalStatus;
use crate::repositories::{ResultFilter, ResultMutation, ResultRepository, ResultTransition};
use crate::services::errors::{EngineError, StoreError};
use crate::services::result_workflow::WorkflowState;

pub(crate) const COLUMNS: &str = "\
    id, school_id, examination_id, student_id, subject_results, remarks, is_draft, \
    approval_status, rejection_reason, total_marks_obtained, total_max_marks, \
    overall_percentage, overall_grade, overall_status, submitted_by, reviewed_by, \
    reviewed_at, reopened_by, reopened_at, reopen_reason, created_at, updated_at";

pub(crate) struct PgResultRepository {
    pool: PgPool,
}

impl PgResultRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filter(
    builder: &mut QueryBuilder<'_, Postgres>,
    school_id: &str,
    filter: ResultFilter<'_>,
) {
    builder.push(" WHERE school_id = ");
    builder.push_bind(school_id.to_string());
    if let Some(examination_id) = filter.examination_id {
        builder.push(" AND examination_id = ");
        builder.push_bind(examination_id.to_string());
    }
    if let Some(examination_ids) = filter.examination_ids {
        builder.push(" AND examination_id = ANY(");
        builder.push_bind(examination_ids.to_vec());
        builder.push(")");
    }
    if let Some(student_id) = filter.student_id {
        builder.push(" AND student_id = ");
        builder.push_bind(student_id.to_string());
    }
    match filter.state {
        Some(WorkflowState::Draft) => {
            builder.push(" AND is_draft = TRUE");
        }
        Some(WorkflowState::Pending) => {
            builder
                .push(" AND is_draft = FALSE AND (approval_status IS NULL OR approval_status = ");
            builder.push_bind(ApprovalStatus::Pending);
            builder.push(")");
        }
        Some(WorkflowState::Approved) => {
            builder.push(" AND is_draft = FALSE AND approval_status = ");
            builder.push_bind(ApprovalStatus::Approved);
        }
        Some(WorkflowState::Rejected) => {
            builder.push(" AND is_draft = FALSE AND approval_status = ");
            builder.push_bind(ApprovalStatus::Rejected);
        }
        None => {}
    }
}

async fn write_record(
    tx: &mut Transaction<'_, Postgres>,
    record: &ResultRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO results (
            id, school_id, examination_id, student_id, subject_results, remarks, is_draft,
            approval_status, rejection_reason, total_marks_obtained, total_max_marks,
            overall_percentage, overall_grade, overall_status, submitted_by, reviewed_by,
            reviewed_at, reopened_by, reopened_at, reopen_reason, created_at, updated_at
         ) VALUES (
            $1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22
         )
         ON CONFLICT (examination_id, student_id) DO UPDATE
             SET subject_results = EXCLUDED.subject_results,
                 remarks = EXCLUDED.remarks,
                 is_draft = EXCLUDED.is_draft,
                 approval_status = EXCLUDED.approval_status,
                 rejection_reason = EXCLUDED.rejection_reason,
                 total_marks_obtained = EXCLUDED.total_marks_obtained,
                 total_max_marks = EXCLUDED.total_max_marks,
                 overall_percentage = EXCLUDED.overall_percentage,
                 overall_grade = EXCLUDED.overall_grade,
                 overall_status = EXCLUDED.overall_status,
                 submitted_by = EXCLUDED.submitted_by,
                 reviewed_by = EXCLUDED.reviewed_by,
                 reviewed_at = EXCLUDED.reviewed_at,
                 reopened_by = EXCLUDED.reopened_by,
                 reopened_at = EXCLUDED.reopened_at,
                 reopen_reason = EXCLUDED.reopen_reason,
                 updated_at = EXCLUDED.updated_at",
    )
    .bind(&record.id)
    .bind(&record.school_id)
    .bind(&record.examination_id)
    .bind(&record.student_id)
    .bind(&record.subject_results)
    .bind(&record.remarks)
    .bind(record.is_draft)
    .bind(record.approval_status)
    .bind(&record.rejection_reason)
    .bind(record.total_marks_obtained)
    .bind(record.total_max_marks)
    .bind(record.overall_percentage)
    .bind(&record.overall_grade)
    .bind(record.overall_status)
    .bind(&record.submitted_by)
    .bind(&record.reviewed_by)
    .bind(record.reviewed_at)
    .bind(&record.reopened_by)
    .bind(record.reopened_at)
    .bind(&record.reopen_reason)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl ResultRepository for PgResultRepository {
    async fn find(&self, school_id: &str, id: &str) -> Result<Option<ResultRecord>, StoreError> {
        let record = sqlx::query_as::<_, ResultRecord>(&format!(
            "SELECT {COLUMNS} FROM results WHERE id = $1 AND school_id = $2"
        ))
        .bind(id)
        .bind(school_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list(
        &self,
        school_id: &str,
        filter: ResultFilter<'_>,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<ResultRecord>, i64), StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM results"));
        push_filter(&mut builder, school_id, filter);
        builder.push(" ORDER BY updated_at DESC, id OFFSET ");
        builder.push_bind(skip.max(0));
        builder.push(" LIMIT ");
        builder.push_bind(limit.clamp(1, 1000));
        let records = builder.build_query_as::<ResultRecord>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM results");
        push_filter(&mut count, school_id, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok((records, total))
    }

    async fn upsert_locked(
        &self,
        school_id: &str,
        examination_id: &str,
        student_id: &str,
        mutation: ResultMutation,
    ) -> Result<ResultRecord, EngineError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        // Row locks cannot cover a result that does not exist yet.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("result:{examination_id}:{student_id}"))
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        let existing = sqlx::query_as::<_, ResultRecord>(&format!(
            "SELECT {COLUMNS}
             FROM results
             WHERE examination_id = $1 AND student_id = $2 AND school_id = $3
             FOR UPDATE"
        ))
        .bind(examination_id)
        .bind(student_id)
        .bind(school_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        let record = mutation(existing)?;
        write_record(&mut tx, &record).await.map_err(StoreError::from)?;
        tx.commit().await.map_err(StoreError::from)?;
        Ok(record)
    }

    async fn update_locked(
        &self,
        school_id: &str,
        id: &str,
        transition: ResultTransition,
    ) -> Result<ResultRecord, EngineError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let existing = sqlx::query_as::<_, ResultRecord>(&format!(
            "SELECT {COLUMNS} FROM results WHERE id = $1 AND school_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(school_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        let Some(existing) = existing else {
            return Err(EngineError::NotFound("Result not found".to_string()));
        };

        let record = transition(existing)?;
        write_record(&mut tx, &record).await.map_err(StoreError::from)?;
        tx.commit().await.map_err(StoreError::from)?;
        Ok(record)
    }
}
