use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::pagination::default_limit;
use crate::core::time::format_primitive;
use crate::db::models::{ResultRecord, SubjectResult};
use crate::db::types::{ApprovalStatus, PassStatus};
use crate::services::result_submission::BulkOutcome;
use crate::services::result_workflow::WorkflowState;

#[derive(Debug, Clone, Deserialize, Validate)]
pub(crate) struct SubmittedMark {
    #[serde(alias = "subjectName")]
    #[validate(length(min = 1, message = "subject_name must not be empty"))]
    pub(crate) subject_name: String,
    #[serde(alias = "marksObtained")]
    pub(crate) marks_obtained: f64,
}

/// Marks for one student. Marks configuration and derived fields sent by the
/// client are ignored.
#[derive(Debug, Clone, Deserialize, Validate)]
pub(crate) struct SubmitResultRequest {
    #[serde(alias = "examinationId")]
    #[validate(length(min = 1, message = "examination_id must not be empty"))]
    pub(crate) examination_id: String,
    #[serde(alias = "studentId")]
    #[validate(length(min = 1, message = "student_id must not be empty"))]
    pub(crate) student_id: String,
    #[serde(default, alias = "subjectResults")]
    #[validate(nested)]
    pub(crate) subject_results: Vec<SubmittedMark>,
    #[serde(default)]
    #[validate(length(max = 500, message = "remarks must be at most 500 characters"))]
    pub(crate) remarks: Option<String>,
    #[serde(default, alias = "isDraft")]
    pub(crate) is_draft: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReasonRequest {
    #[serde(default)]
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkActionRequest {
    #[serde(alias = "resultIds", alias = "ids")]
    pub(crate) result_ids: Vec<String>,
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkActionResponse {
    pub(crate) processed: usize,
    pub(crate) succeeded: usize,
    pub(crate) failed: usize,
    pub(crate) outcomes: Vec<BulkOutcome>,
}

impl From<Vec<BulkOutcome>> for BulkActionResponse {
    fn from(outcomes: Vec<BulkOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|outcome| outcome.ok).count();
        Self {
            processed: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultListQuery {
    #[serde(default, alias = "examinationId")]
    pub(crate) examination_id: Option<String>,
    #[serde(default, alias = "studentId")]
    pub(crate) student_id: Option<String>,
    #[serde(default)]
    pub(crate) state: Option<WorkflowState>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "default_limit")]
    pub(crate) limit: i64,
}

/// A Result as one actor may see it. Aggregates are omitted when some subject
/// entries were hidden from the actor.
#[derive(Debug, Serialize)]
pub(crate) struct ResultResponse {
    pub(crate) id: String,
    pub(crate) examination_id: String,
    pub(crate) student_id: String,
    pub(crate) state: WorkflowState,
    pub(crate) is_draft: bool,
    pub(crate) approval_status: Option<ApprovalStatus>,
    pub(crate) rejection_reason: Option<String>,
    pub(crate) subject_results: Vec<SubjectResult>,
    pub(crate) complete_view: bool,
    pub(crate) total_marks_obtained: Option<f64>,
    pub(crate) total_max_marks: Option<f64>,
    pub(crate) overall_percentage: Option<f64>,
    pub(crate) overall_grade: Option<String>,
    pub(crate) overall_status: Option<PassStatus>,
    pub(crate) remarks: Option<String>,
    pub(crate) submitted_by: String,
    pub(crate) reviewed_by: Option<String>,
    pub(crate) reviewed_at: Option<String>,
    pub(crate) reopened_by: Option<String>,
    pub(crate) reopened_at: Option<String>,
    pub(crate) reopen_reason: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ResultResponse {
    pub(crate) fn full(record: &ResultRecord) -> Self {
        Self::projected(record, record.subject_results.0.clone(), true)
    }

    pub(crate) fn projected(
        record: &ResultRecord,
        subject_results: Vec<SubjectResult>,
        complete: bool,
    ) -> Self {
        Self {
            id: record.id.clone(),
            examination_id: record.examination_id.clone(),
            student_id: record.student_id.clone(),
            state: WorkflowState::of(record),
            is_draft: record.is_draft,
            approval_status: record.approval_status,
            rejection_reason: record.rejection_reason.clone(),
            subject_results,
            complete_view: complete,
            total_marks_obtained: complete.then_some(record.total_marks_obtained),
            total_max_marks: complete.then_some(record.total_max_marks),
            overall_percentage: complete.then_some(record.overall_percentage),
            overall_grade: complete.then(|| record.overall_grade.clone()),
            overall_status: complete.then_some(record.overall_status),
            remarks: record.remarks.clone(),
            submitted_by: record.submitted_by.clone(),
            reviewed_by: record.reviewed_by.clone(),
            reviewed_at: record.reviewed_at.map(format_primitive),
            reopened_by: record.reopened_by.clone(),
            reopened_at: record.reopened_at.map(format_primitive),
            reopen_reason: record.reopen_reason.clone(),
            created_at: format_primitive(record.created_at),
            updated_at: format_primitive(record.updated_at),
        }
    }
}
