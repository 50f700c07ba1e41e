use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use serde::Serialize;
use sqlx::types::Json;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::db::models::{subject_key, Examination, ResultRecord, SubjectResult};
use crate::db::types::ApprovalStatus;
use crate::repositories::ResultFilter;
use crate::schemas::result::{ResultResponse, SubmitResultRequest, SubmittedMark};
use crate::services::access::{project_subject_results, Actor, ActorRole};
use crate::services::errors::{EngineError, ValidationErrors};
use crate::services::result_scoring::{score, GradingScale, MarkEntry};
use crate::services::result_workflow::{self, ApproveOutcome, WorkflowState};

/// Resolves submitted marks against the examination's subject definitions.
/// Marks configuration always comes from the examination.
pub(crate) fn resolve_marks(
    actor: &Actor,
    exam: &Examination,
    marks: &[SubmittedMark],
) -> Result<Vec<MarkEntry>, EngineError> {
    if marks.is_empty() {
        return Err(EngineError::invalid("subject_results", "at least one subject is required"));
    }

    let mut errors = ValidationErrors::default();
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(marks.len());

    for (index, mark) in marks.iter().enumerate() {
        let key = format!("subject_results[{index}].subject_name");
        let Some(subject) = exam.find_subject(&mark.subject_name) else {
            errors.add(key, format!("unknown subject '{}'", mark.subject_name.trim()));
            continue;
        };
        if !seen.insert(subject.id.as_str()) {
            errors.add(key, format!("subject '{}' appears more than once", subject.name));
            continue;
        }
        entries.push((subject, mark.marks_obtained));
    }
    errors.into_result()?;

    if entries.iter().any(|(subject, _)| !actor.may_grade(subject)) {
        return Err(EngineError::Forbidden("Not allowed to grade one or more of these subjects"));
    }

    Ok(entries
        .into_iter()
        .map(|(subject, marks_obtained)| MarkEntry {
            subject_name: subject.name.clone(),
            marks_obtained,
            max_marks: f64::from(subject.max_marks),
            passing_marks: f64::from(subject.passing_marks),
            graded_by: Some(actor.id.clone()),
        })
        .collect())
}

fn check_bounds(entries: &[MarkEntry], current: &str) -> Result<(), EngineError> {
    for entry in entries {
        let in_bounds = entry.marks_obtained.is_finite()
            && entry.marks_obtained >= 0.0
            && entry.marks_obtained <= entry.max_marks;
        if !in_bounds {
            return Err(EngineError::state(
                format!(
                    "marks_obtained for {} must be between 0 and {}",
                    entry.subject_name, entry.max_marks
                ),
                current,
            ));
        }
    }
    Ok(())
}

/// Latest entry per subject name wins; subjects not in `incoming` keep their
/// stored marks. Output follows the examination's subject order, with entries
/// for subjects no longer on the examination kept at the end.
pub(crate) fn merge_marks(
    exam: &Examination,
    stored: &[SubjectResult],
    incoming: Vec<MarkEntry>,
) -> Vec<MarkEntry> {
    let mut by_subject: HashMap<String, MarkEntry> = stored
        .iter()
        .map(|result| (subject_key(&result.subject_name), MarkEntry::from(result)))
        .collect();
    for entry in incoming {
        by_subject.insert(subject_key(&entry.subject_name), entry);
    }

    let mut merged = Vec::with_capacity(by_subject.len());
    let mut subjects: Vec<_> = exam.subjects.iter().collect();
    subjects.sort_by_key(|subject| subject.position);
    for subject in subjects {
        if let Some(mut entry) = by_subject.remove(&subject_key(&subject.name)) {
            entry.subject_name = subject.name.clone();
            entry.max_marks = f64::from(subject.max_marks);
            entry.passing_marks = f64::from(subject.passing_marks);
            merged.push(entry);
        }
    }

    let mut orphans: Vec<MarkEntry> = by_subject.into_values().collect();
    orphans.sort_by(|a, b| a.subject_name.cmp(&b.subject_name));
    merged.extend(orphans);
    merged
}

/// Everything needed to fold one submission into the stored Result.
pub(crate) struct Submission {
    pub(crate) actor_id: String,
    pub(crate) school_id: String,
    pub(crate) exam: Examination,
    pub(crate) student_id: String,
    pub(crate) entries: Vec<MarkEntry>,
    pub(crate) remarks: Option<String>,
    pub(crate) is_draft: bool,
    pub(crate) scale: GradingScale,
    pub(crate) now: PrimitiveDateTime,
}

/// Merges, rescores the full subject list and advances the workflow.
pub(crate) fn apply_submission(
    existing: Option<ResultRecord>,
    submission: Submission,
) -> Result<ResultRecord, EngineError> {
    let current = existing.as_ref().map_or("new", |record| WorkflowState::of(record).as_str());
    check_bounds(&submission.entries, current)?;

    let stored = existing.as_ref().map(|record| record.subject_results.0.as_slice()).unwrap_or(&[]);
    let merged = merge_marks(&submission.exam, stored, submission.entries);
    let scored = score(&merged, &submission.scale);

    let mut record = existing.unwrap_or_else(|| ResultRecord {
        id: Uuid::new_v4().to_string(),
        school_id: submission.school_id.clone(),
        examination_id: submission.exam.id.clone(),
        student_id: submission.student_id.clone(),
        subject_results: Json(Vec::new()),
        remarks: None,
        is_draft: true,
        approval_status: None,
        rejection_reason: None,
        total_marks_obtained: 0.0,
        total_max_marks: 0.0,
        overall_percentage: 0.0,
        overall_grade: String::new(),
        overall_status: scored.overall_status,
        submitted_by: submission.actor_id.clone(),
        reviewed_by: None,
        reviewed_at: None,
        reopened_by: None,
        reopened_at: None,
        reopen_reason: None,
        created_at: submission.now,
        updated_at: submission.now,
    });

    result_workflow::record_submission(&mut record, submission.is_draft, submission.now)?;

    record.subject_results = Json(scored.subjects);
    record.total_marks_obtained = scored.total_marks_obtained;
    record.total_max_marks = scored.total_max_marks;
    record.overall_percentage = scored.percentage;
    record.overall_grade = scored.overall_grade;
    record.overall_status = scored.overall_status;
    record.submitted_by = submission.actor_id;
    if let Some(remarks) = submission.remarks {
        record.remarks = Some(remarks);
    }
    Ok(record)
}

fn observe<T>(transition: &'static str, outcome: &Result<T, EngineError>) {
    let label = match outcome {
        Ok(_) => "ok",
        Err(err) => err.kind(),
    };
    metrics::record_transition(transition, label);
}

pub(crate) async fn submit_result(
    state: &AppState,
    actor: &Actor,
    request: SubmitResultRequest,
    now: PrimitiveDateTime,
) -> Result<ResultRecord, EngineError> {
    let transition = if request.is_draft { "save_draft" } else { "submit" };
    let outcome = submit_inner(state, actor, request, now).await;
    observe(transition, &outcome);
    outcome
}

async fn submit_inner(
    state: &AppState,
    actor: &Actor,
    request: SubmitResultRequest,
    now: PrimitiveDateTime,
) -> Result<ResultRecord, EngineError> {
    if !actor.can_grade() {
        return Err(EngineError::Forbidden("Grading access required"));
    }

    let repos = state.repos();
    let exam = repos
        .exams
        .find(&actor.school_id, &request.examination_id)
        .await?
        .ok_or_else(|| EngineError::NotFound("Examination not found".to_string()))?;
    let student = repos
        .directory
        .find_student(&actor.school_id, &request.student_id)
        .await?
        .ok_or_else(|| EngineError::NotFound("Student not found".to_string()))?;
    if !student.class_name.trim().eq_ignore_ascii_case(exam.class_name.trim()) {
        return Err(EngineError::invalid(
            "student_id",
            "student is not enrolled in the examination's class",
        ));
    }

    let entries = resolve_marks(actor, &exam, &request.subject_results)?;
    let subjects: Vec<String> = entries.iter().map(|entry| entry.subject_name.clone()).collect();

    let submission = Submission {
        actor_id: actor.id.clone(),
        school_id: actor.school_id.clone(),
        exam,
        student_id: student.id.clone(),
        entries,
        remarks: request.remarks.filter(|remarks| !remarks.trim().is_empty()),
        is_draft: request.is_draft,
        scale: state.settings().grading().scale.clone(),
        now,
    };

    let record = repos
        .results
        .upsert_locked(
            &actor.school_id,
            &request.examination_id,
            &student.id,
            Box::new(move |existing: Option<ResultRecord>| apply_submission(existing, submission)),
        )
        .await?;

    tracing::info!(
        result_id = %record.id,
        examination_id = %record.examination_id,
        student_id = %record.student_id,
        actor_id = %actor.id,
        subjects = ?subjects,
        state = WorkflowState::of(&record).as_str(),
        "Result marks recorded"
    );
    Ok(record)
}

#[derive(Debug, Clone)]
pub(crate) enum ReviewAction {
    Approve,
    Reject { reason: String },
    Reopen { reason: String },
}

impl ReviewAction {
    fn label(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject { .. } => "reject",
            Self::Reopen { .. } => "reopen",
        }
    }

    fn authorize(&self, actor: &Actor) -> Result<(), EngineError> {
        match self {
            Self::Approve | Self::Reject { .. } if !actor.can_approve_results() => {
                Err(EngineError::Forbidden("Exam controller or admin access required"))
            }
            Self::Reopen { .. } if !actor.can_reopen_results() => {
                Err(EngineError::Forbidden("Admin access required to reopen results"))
            }
            _ => Ok(()),
        }
    }
}

/// Applies one review transition under the result's row lock.
pub(crate) async fn transition_result(
    state: &AppState,
    actor: &Actor,
    result_id: &str,
    action: ReviewAction,
    now: PrimitiveDateTime,
) -> Result<ResultRecord, EngineError> {
    let label = action.label();
    let outcome = transition_inner(state, actor, result_id, action, now).await;
    observe(label, &outcome);
    outcome
}

async fn transition_inner(
    state: &AppState,
    actor: &Actor,
    result_id: &str,
    action: ReviewAction,
    now: PrimitiveDateTime,
) -> Result<ResultRecord, EngineError> {
    action.authorize(actor)?;

    let reviewer = actor.clone();
    let applied = action.clone();
    let record = state
        .repos()
        .results
        .update_locked(
            &actor.school_id,
            result_id,
            Box::new(move |mut record: ResultRecord| -> Result<ResultRecord, EngineError> {
                match &applied {
                    ReviewAction::Approve => {
                        if result_workflow::approve(&mut record, &reviewer, now)?
                            == ApproveOutcome::AlreadyApproved
                        {
                            tracing::debug!(result_id = %record.id, "Result already approved");
                        }
                    }
                    ReviewAction::Reject { reason } => {
                        result_workflow::reject(&mut record, &reviewer, reason, now)?;
                    }
                    ReviewAction::Reopen { reason } => {
                        result_workflow::reopen(&mut record, &reviewer, reason, now)?;
                    }
                }
                Ok(record)
            }),
        )
        .await?;

    match &action {
        ReviewAction::Reopen { reason } => tracing::warn!(
            result_id = %record.id,
            actor_id = %actor.id,
            reason = %reason.trim(),
            "Approved result reopened"
        ),
        _ => tracing::info!(
            result_id = %record.id,
            actor_id = %actor.id,
            transition = action.label(),
            "Result reviewed"
        ),
    }
    Ok(record)
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BulkError {
    pub(crate) kind: &'static str,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) current: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BulkOutcome {
    pub(crate) result_id: String,
    pub(crate) ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) state: Option<WorkflowState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<BulkError>,
}

impl BulkOutcome {
    fn from_result(result_id: String, outcome: Result<ResultRecord, EngineError>) -> Self {
        match outcome {
            Ok(record) => Self {
                result_id,
                ok: true,
                state: Some(WorkflowState::of(&record)),
                error: None,
            },
            Err(err) => {
                let current = match &err {
                    EngineError::State { current, .. } => Some(current.clone()),
                    _ => None,
                };
                let message = match &err {
                    EngineError::Store(_) | EngineError::Rendering(_) => {
                        tracing::error!(error = %err, result_id = %result_id, "Bulk item failed");
                        "Internal error".to_string()
                    }
                    other => other.to_string(),
                };
                Self {
                    result_id,
                    ok: false,
                    state: None,
                    error: Some(BulkError { kind: err.kind(), message, current }),
                }
            }
        }
    }
}

/// Runs the single-item transition for every id independently. One id failing
/// never rolls back or aborts the others.
pub(crate) async fn bulk_transition(
    state: &AppState,
    actor: &Actor,
    result_ids: Vec<String>,
    action: ReviewAction,
    now: PrimitiveDateTime,
) -> Result<Vec<BulkOutcome>, EngineError> {
    action.authorize(actor)?;
    if let ReviewAction::Reject { reason } | ReviewAction::Reopen { reason } = &action {
        if reason.trim().is_empty() {
            return Err(EngineError::invalid("reason", "reason is required"));
        }
    }
    if result_ids.is_empty() {
        return Err(EngineError::invalid("result_ids", "at least one result id is required"));
    }

    let mut seen = HashSet::new();
    let unique: Vec<String> = result_ids.into_iter().filter(|id| seen.insert(id.clone())).collect();

    let outcomes = join_all(unique.iter().map(|id| {
        let action = action.clone();
        async move { transition_result(state, actor, id, action, now).await }
    }))
    .await;

    Ok(unique
        .into_iter()
        .zip(outcomes)
        .map(|(id, outcome)| BulkOutcome::from_result(id, outcome))
        .collect())
}

/// Projects a stored Result for `actor`, or `None` when the actor may not see it.
pub(crate) fn view_for(
    actor: &Actor,
    exam: &Examination,
    record: &ResultRecord,
) -> Option<ResultResponse> {
    match actor.role {
        ActorRole::Admin | ActorRole::ExamController => Some(ResultResponse::full(record)),
        ActorRole::Student => {
            let published = !record.is_draft
                && record.approval_status == Some(ApprovalStatus::Approved);
            (record.student_id == actor.id && published).then(|| ResultResponse::full(record))
        }
        ActorRole::Teacher => {
            let (subjects, complete) =
                project_subject_results(actor, exam, &record.subject_results.0);
            let teaches_exam = exam.subjects.iter().any(|subject| actor.teaches(subject));
            teaches_exam.then(|| ResultResponse::projected(record, subjects, complete))
        }
    }
}

pub(crate) async fn read_result(
    state: &AppState,
    actor: &Actor,
    result_id: &str,
) -> Result<ResultResponse, EngineError> {
    let not_found = || EngineError::NotFound("Result not found".to_string());
    let repos = state.repos();

    let record = repos.results.find(&actor.school_id, result_id).await?.ok_or_else(not_found)?;
    let exam =
        repos.exams.find(&actor.school_id, &record.examination_id).await?.ok_or_else(not_found)?;
    view_for(actor, &exam, &record).ok_or_else(not_found)
}

pub(crate) struct ResultPage {
    pub(crate) items: Vec<ResultResponse>,
    pub(crate) total_count: i64,
}

/// Ids of the examinations with at least one subject the teacher teaches.
async fn taught_examinations(state: &AppState, actor: &Actor) -> Result<Vec<String>, EngineError> {
    let exams = state.repos().exams.list_for_school(&actor.school_id).await?;
    Ok(exams
        .into_iter()
        .filter(|exam| exam.subjects.iter().any(|subject| actor.teaches(subject)))
        .map(|exam| exam.id)
        .collect())
}

pub(crate) async fn list_results<'a>(
    state: &AppState,
    actor: &'a Actor,
    mut filter: ResultFilter<'a>,
    skip: i64,
    limit: i64,
) -> Result<ResultPage, EngineError> {
    if actor.role == ActorRole::Student {
        filter.student_id = Some(actor.id.as_str());
        filter.state = Some(WorkflowState::Approved);
    }

    let repos = state.repos();
    let taught = match actor.role {
        ActorRole::Teacher => Some(taught_examinations(state, actor).await?),
        _ => None,
    };
    if taught.as_ref().is_some_and(Vec::is_empty) {
        return Ok(ResultPage { items: Vec::new(), total_count: 0 });
    }
    let filter = ResultFilter { examination_ids: taught.as_deref(), ..filter };
    let (records, total_count) = repos.results.list(&actor.school_id, filter, skip, limit).await?;

    let mut exams: HashMap<String, Option<Examination>> = HashMap::new();
    let mut items = Vec::with_capacity(records.len());
    for record in &records {
        if !exams.contains_key(&record.examination_id) {
            let exam = repos.exams.find(&actor.school_id, &record.examination_id).await?;
            exams.insert(record.examination_id.clone(), exam);
        }
        let Some(Some(exam)) = exams.get(&record.examination_id) else {
            continue;
        };
        if let Some(view) = view_for(actor, exam, record) {
            items.push(view);
        }
    }

    Ok(ResultPage { items, total_count })
}
