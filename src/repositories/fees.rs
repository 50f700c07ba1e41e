use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::models::Fee;
use crate::repositories::FeeLedger;
use crate::services::errors::StoreError;

/// Read-only view over the fee records owned by the billing system.
pub(crate) struct PgFeeLedger {
    pool: PgPool,
}

impl PgFeeLedger {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeeLedger for PgFeeLedger {
    async fn fees_for_student(
        &self,
        school_id: &str,
        student_id: &str,
    ) -> Result<Vec<Fee>, StoreError> {
        let fees = sqlx::query_as::<_, Fee>(
            "SELECT id, school_id, student_id, description, amount, paid_amount, status, due_date
             FROM fees
             WHERE school_id = $1 AND student_id = $2
             ORDER BY due_date NULLS LAST, id",
        )
        .bind(school_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(fees)
    }
}
