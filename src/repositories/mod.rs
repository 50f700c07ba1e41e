use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use time::{Date, PrimitiveDateTime};

use crate::core::config::{Settings, StorageBackend};
use crate::db::models::{
    Examination, Fee, InvigilatedSession, ResultRecord, StudentProfile, TeacherProfile,
};
use crate::db::types::ExamStatus;
use crate::services::errors::{EngineError, StoreError};
use crate::services::result_workflow::WorkflowState;

pub(crate) mod directory;
pub(crate) mod exams;
pub(crate) mod fees;
pub(crate) mod memory;
pub(crate) mod results;

/// Read-modify-write step for the Result of one (examination, student) pair.
/// Receives the stored record, if any, and returns the record to persist.
pub(crate) type ResultMutation =
    Box<dyn FnOnce(Option<ResultRecord>) -> Result<ResultRecord, EngineError> + Send>;

/// Read-modify-write step for an existing Result.
pub(crate) type ResultTransition =
    Box<dyn FnOnce(ResultRecord) -> Result<ResultRecord, EngineError> + Send>;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ResultFilter<'a> {
    pub(crate) examination_id: Option<&'a str>,
    pub(crate) student_id: Option<&'a str>,
    pub(crate) state: Option<WorkflowState>,
    /// Restricts results to these examinations when set.
    pub(crate) examination_ids: Option<&'a [String]>,
}

#[async_trait]
pub(crate) trait ExamRepository: Send + Sync {
    async fn insert(&self, exam: &Examination) -> Result<(), StoreError>;

    /// Overwrites the examination row and its full subject list.
    async fn replace(&self, exam: &Examination) -> Result<(), StoreError>;

    async fn find(&self, school_id: &str, id: &str) -> Result<Option<Examination>, StoreError>;

    async fn list(
        &self,
        school_id: &str,
        status: Option<ExamStatus>,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Examination>, i64), StoreError>;

    /// Every examination of the school with its subjects, unpaged.
    async fn list_for_school(&self, school_id: &str) -> Result<Vec<Examination>, StoreError>;

    async fn update_status(
        &self,
        school_id: &str,
        id: &str,
        status: ExamStatus,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError>;

    /// Removes the examination together with its subjects and results.
    async fn delete(&self, school_id: &str, id: &str) -> Result<bool, StoreError>;

    /// Every subject session on `date` where `teacher_id` is an invigilator.
    async fn sessions_for_teacher(
        &self,
        school_id: &str,
        teacher_id: &str,
        date: Date,
    ) -> Result<Vec<InvigilatedSession>, StoreError>;
}

#[async_trait]
pub(crate) trait ResultRepository: Send + Sync {
    async fn find(&self, school_id: &str, id: &str) -> Result<Option<ResultRecord>, StoreError>;

    async fn list(
        &self,
        school_id: &str,
        filter: ResultFilter<'_>,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<ResultRecord>, i64), StoreError>;

    /// Applies `mutation` while holding the per-(examination, student) lock so
    /// concurrent submissions for different subjects cannot drop each other.
    async fn upsert_locked(
        &self,
        school_id: &str,
        examination_id: &str,
        student_id: &str,
        mutation: ResultMutation,
    ) -> Result<ResultRecord, EngineError>;

    async fn update_locked(
        &self,
        school_id: &str,
        id: &str,
        transition: ResultTransition,
    ) -> Result<ResultRecord, EngineError>;
}

#[async_trait]
pub(crate) trait FeeLedger: Send + Sync {
    async fn fees_for_student(
        &self,
        school_id: &str,
        student_id: &str,
    ) -> Result<Vec<Fee>, StoreError>;
}

#[async_trait]
pub(crate) trait Directory: Send + Sync {
    async fn find_student(
        &self,
        school_id: &str,
        id: &str,
    ) -> Result<Option<StudentProfile>, StoreError>;

    async fn find_teacher(
        &self,
        school_id: &str,
        id: &str,
    ) -> Result<Option<TeacherProfile>, StoreError>;
}

#[derive(Clone)]
pub(crate) struct Repositories {
    pub(crate) exams: Arc<dyn ExamRepository>,
    pub(crate) results: Arc<dyn ResultRepository>,
    pub(crate) fees: Arc<dyn FeeLedger>,
    pub(crate) directory: Arc<dyn Directory>,
    pool: Option<PgPool>,
}

impl Repositories {
    pub(crate) fn postgres(pool: PgPool) -> Self {
        Self {
            exams: Arc::new(exams::PgExamRepository::new(pool.clone())),
            results: Arc::new(results::PgResultRepository::new(pool.clone())),
            fees: Arc::new(fees::PgFeeLedger::new(pool.clone())),
            directory: Arc::new(directory::PgDirectory::new(pool.clone())),
            pool: Some(pool),
        }
    }

    pub(crate) fn memory(store: memory::MemoryStore) -> Self {
        Self {
            exams: Arc::new(store.clone()),
            results: Arc::new(store.clone()),
            fees: Arc::new(store.clone()),
            directory: Arc::new(store),
            pool: None,
        }
    }

    /// Opens the configured backend. Postgres connections run pending migrations.
    pub(crate) async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        match settings.database().backend {
            StorageBackend::Postgres => {
                let pool = crate::db::init_pool(settings).await?;
                crate::db::run_migrations(&pool).await?;
                Ok(Self::postgres(pool))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok(Self::memory(memory::MemoryStore::default()))
            }
        }
    }

    pub(crate) fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }
}
