use std::collections::{HashMap, HashSet};

use sqlx::types::Json;
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::db::models::{ExamSubject, Examination, InvigilatedSession, InvigilatorAssignment};
use crate::db::types::ExamStatus;
use crate::schemas::exam::{ConflictCheckRequest, ExaminationDraft, SubjectDraft, ValidationReport};
use crate::services::access::{visible_subjects, Actor};
use crate::services::errors::{EngineError, ValidationErrors};
use crate::services::exam_validation::{validate_examination, ValidationContext};
use crate::services::schedule_conflicts::{
    conflicts_for_candidates, has_conflict, ConflictCheck, ConflictIndex, ConflictQuery,
    InvigilatorConflict,
};

const MANAGE_REQUIRED: &str = "Exam controller or admin access required";

fn require_manager(actor: &Actor) -> Result<(), EngineError> {
    if actor.can_manage_examinations() {
        Ok(())
    } else {
        Err(EngineError::Forbidden(MANAGE_REQUIRED))
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, EngineError> {
    value.ok_or_else(|| EngineError::invalid(field, format!("{field} is required")))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

async fn load_examination(
    state: &AppState,
    actor: &Actor,
    id: &str,
) -> Result<Examination, EngineError> {
    state
        .repos()
        .exams
        .find(&actor.school_id, id)
        .await?
        .ok_or_else(|| EngineError::NotFound("Examination not found".to_string()))
}

fn ensure_mutable(exam: &Examination, today: Date) -> Result<(), EngineError> {
    if exam.is_mutable_on(today) {
        Ok(())
    } else {
        Err(EngineError::state("Examination has ended and can no longer be changed", "ended"))
    }
}

/// Fills invigilator display names from the teacher directory.
async fn resolve_invigilators(
    state: &AppState,
    school_id: &str,
    drafts: &[SubjectDraft],
) -> Result<Vec<Vec<InvigilatorAssignment>>, EngineError> {
    let mut errors = ValidationErrors::default();
    let mut names: HashMap<String, Option<String>> = HashMap::new();
    let mut resolved = Vec::with_capacity(drafts.len());

    for (index, subject) in drafts.iter().enumerate() {
        let mut assignments = Vec::with_capacity(subject.invigilators.len());
        for (slot, invigilator) in subject.invigilators.iter().enumerate() {
            let teacher_id = non_blank(invigilator.teacher_id.as_deref());
            let given_name = non_blank(invigilator.name.as_deref());

            let directory_name = match &teacher_id {
                Some(teacher_id) => {
                    if !names.contains_key(teacher_id) {
                        let teacher =
                            state.repos().directory.find_teacher(school_id, teacher_id).await?;
                        names.insert(teacher_id.clone(), teacher.map(|teacher| teacher.full_name));
                    }
                    let known = names.get(teacher_id).cloned().flatten();
                    if known.is_none() {
                        errors.add(
                            format!("subjects[{index}].invigilators[{slot}].teacher_id"),
                            format!("unknown teacher '{teacher_id}'"),
                        );
                    }
                    known
                }
                None => None,
            };

            assignments.push(InvigilatorAssignment {
                name: given_name.or(directory_name).unwrap_or_default(),
                teacher_id,
                role: invigilator.role,
            });
        }
        resolved.push(assignments);
    }

    errors.into_result()?;
    Ok(resolved)
}

/// Builds the subject list of a validated draft. Ids echoed back by the client
/// are kept when they name a subject of the stored examination.
fn build_subjects(
    exam_id: &str,
    drafts: &[SubjectDraft],
    invigilators: Vec<Vec<InvigilatorAssignment>>,
    existing: &[ExamSubject],
) -> Result<Vec<ExamSubject>, EngineError> {
    let known_ids: HashSet<&str> = existing.iter().map(|subject| subject.id.as_str()).collect();
    let mut used = HashSet::new();

    drafts
        .iter()
        .zip(invigilators)
        .enumerate()
        .map(|(index, (draft, invigilators))| {
            let id = draft
                .id
                .as_deref()
                .filter(|id| known_ids.contains(id) && used.insert(id.to_string()))
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            Ok(ExamSubject {
                id,
                examination_id: exam_id.to_string(),
                position: i32::try_from(index).unwrap_or(i32::MAX),
                name: required(non_blank(draft.name.as_deref()), "name")?,
                exam_date: required(draft.exam_date, "exam_date")?,
                start_time: required(draft.start_time, "start_time")?,
                duration_minutes: required(draft.duration_minutes, "duration_minutes")?,
                room: non_blank(draft.room.as_deref()),
                max_marks: required(draft.max_marks, "max_marks")?,
                total_marks: required(draft.total_marks, "total_marks")?,
                passing_marks: required(draft.passing_marks, "passing_marks")?,
                teacher_id: non_blank(draft.teacher_id.as_deref()),
                invigilators: Json(invigilators),
            })
        })
        .collect()
}

fn sessions_of(
    exam_id: &str,
    exam_name: &str,
    subjects: &[ExamSubject],
) -> Vec<InvigilatedSession> {
    subjects
        .iter()
        .flat_map(|subject| {
            let mut teachers: Vec<&str> = subject
                .invigilators
                .0
                .iter()
                .filter_map(|slot| slot.teacher_id.as_deref())
                .collect();
            teachers.sort_unstable();
            teachers.dedup();
            teachers.into_iter().map(move |teacher_id| InvigilatedSession {
                examination_id: exam_id.to_string(),
                examination_name: exam_name.to_string(),
                subject_id: subject.id.clone(),
                subject_name: subject.name.clone(),
                teacher_id: teacher_id.to_string(),
                exam_date: subject.exam_date,
                start_time: subject.start_time,
                duration_minutes: subject.duration_minutes,
            })
        })
        .collect()
}

/// Advisory double-booking check for every invigilator slot of an examination,
/// against other examinations in the school and against its own sessions.
async fn advisory_conflicts(
    state: &AppState,
    school_id: &str,
    candidates: Vec<InvigilatedSession>,
) -> Result<Vec<InvigilatorConflict>, EngineError> {
    let own_exam = candidates.first().map(|session| session.examination_id.clone());
    let slots: HashSet<(String, Date)> =
        candidates.iter().map(|session| (session.teacher_id.clone(), session.exam_date)).collect();

    let mut existing = Vec::new();
    for (teacher_id, date) in slots {
        let sessions =
            state.repos().exams.sessions_for_teacher(school_id, &teacher_id, date).await?;
        existing.extend(
            sessions
                .into_iter()
                .filter(|session| Some(&session.examination_id) != own_exam.as_ref()),
        );
    }

    let conflicts = conflicts_for_candidates(&candidates, existing);
    metrics::record_invigilator_conflicts(conflicts.len());
    if !conflicts.is_empty() {
        tracing::info!(
            school_id,
            conflicts = conflicts.len(),
            "Invigilator double-bookings detected"
        );
    }
    Ok(conflicts)
}

/// Validation plus advisory conflicts without persisting anything.
pub(crate) async fn validate_draft(
    state: &AppState,
    actor: &Actor,
    draft: &ExaminationDraft,
    examination_id: Option<&str>,
    today: Date,
) -> Result<ValidationReport, EngineError> {
    require_manager(actor)?;

    let stored = match examination_id {
        Some(id) => Some(load_examination(state, actor, id).await?),
        None => None,
    };
    let context = ValidationContext {
        today,
        original_start_date: stored.as_ref().map(|exam| exam.exam_start_date),
    };
    let errors = validate_examination(draft, &context).err().unwrap_or_default();

    let exam_id = stored.as_ref().map_or("draft", |exam| exam.id.as_str());
    let exam_name = draft.name.as_deref().unwrap_or_default();
    let candidates: Vec<InvigilatedSession> = draft
        .subjects
        .iter()
        .enumerate()
        .filter_map(|(index, subject)| {
            let (Some(exam_date), Some(start_time), Some(duration_minutes)) =
                (subject.exam_date, subject.start_time, subject.duration_minutes)
            else {
                return None;
            };
            let subject_id = subject.id.clone().unwrap_or_else(|| format!("subjects[{index}]"));
            let teachers: HashSet<String> = subject
                .invigilators
                .iter()
                .filter_map(|slot| non_blank(slot.teacher_id.as_deref()))
                .collect();
            Some(teachers.into_iter().map(move |teacher_id| InvigilatedSession {
                examination_id: exam_id.to_string(),
                examination_name: exam_name.to_string(),
                subject_id: subject_id.clone(),
                subject_name: subject.name.clone().unwrap_or_default(),
                teacher_id,
                exam_date,
                start_time,
                duration_minutes,
            }))
        })
        .flatten()
        .collect();

    let conflicts = advisory_conflicts(state, &actor.school_id, candidates).await?;
    Ok(ValidationReport { valid: errors.is_empty(), errors, conflicts })
}

pub(crate) async fn create_examination(
    state: &AppState,
    actor: &Actor,
    draft: ExaminationDraft,
    now: PrimitiveDateTime,
) -> Result<(Examination, Vec<InvigilatorConflict>), EngineError> {
    require_manager(actor)?;
    validate_examination(
        &draft,
        &ValidationContext { today: now.date(), original_start_date: None },
    )?;

    let invigilators = resolve_invigilators(state, &actor.school_id, &draft.subjects).await?;
    let id = Uuid::new_v4().to_string();
    let subjects = build_subjects(&id, &draft.subjects, invigilators, &[])?;

    let exam = Examination {
        id,
        school_id: actor.school_id.clone(),
        name: required(non_blank(draft.name.as_deref()), "name")?,
        code: non_blank(draft.code.as_deref()),
        exam_type: required(draft.exam_type, "exam_type")?,
        class_name: required(non_blank(draft.class_name.as_deref()), "class_name")?,
        sections: draft.sections.iter().map(|section| section.trim().to_string()).collect(),
        description: non_blank(draft.description.as_deref()),
        exam_start_date: required(draft.exam_start_date, "exam_start_date")?,
        exam_end_date: required(draft.exam_end_date, "exam_end_date")?,
        status: ExamStatus::Draft,
        created_by: actor.id.clone(),
        created_at: now,
        updated_at: now,
        subjects,
    };

    state.repos().exams.insert(&exam).await?;
    tracing::info!(
        examination_id = %exam.id,
        school_id = %exam.school_id,
        subjects = exam.subjects.len(),
        "Examination created"
    );

    let sessions = sessions_of(&exam.id, &exam.name, &exam.subjects);
    let conflicts = advisory_conflicts(state, &actor.school_id, sessions).await?;
    Ok((exam, conflicts))
}

pub(crate) async fn update_examination(
    state: &AppState,
    actor: &Actor,
    id: &str,
    draft: ExaminationDraft,
    now: PrimitiveDateTime,
) -> Result<(Examination, Vec<InvigilatorConflict>), EngineError> {
    require_manager(actor)?;
    let stored = load_examination(state, actor, id).await?;
    ensure_mutable(&stored, now.date())?;

    validate_examination(
        &draft,
        &ValidationContext { today: now.date(), original_start_date: Some(stored.exam_start_date) },
    )?;

    let invigilators = resolve_invigilators(state, &actor.school_id, &draft.subjects).await?;
    let subjects = build_subjects(&stored.id, &draft.subjects, invigilators, &stored.subjects)?;

    let exam = Examination {
        name: required(non_blank(draft.name.as_deref()), "name")?,
        code: non_blank(draft.code.as_deref()),
        exam_type: required(draft.exam_type, "exam_type")?,
        class_name: required(non_blank(draft.class_name.as_deref()), "class_name")?,
        sections: draft.sections.iter().map(|section| section.trim().to_string()).collect(),
        description: non_blank(draft.description.as_deref()),
        exam_start_date: required(draft.exam_start_date, "exam_start_date")?,
        exam_end_date: required(draft.exam_end_date, "exam_end_date")?,
        updated_at: now,
        subjects,
        ..stored
    };

    state.repos().exams.replace(&exam).await?;
    tracing::info!(examination_id = %exam.id, "Examination updated");

    let sessions = sessions_of(&exam.id, &exam.name, &exam.subjects);
    let conflicts = advisory_conflicts(state, &actor.school_id, sessions).await?;
    Ok((exam, conflicts))
}

pub(crate) async fn change_status(
    state: &AppState,
    actor: &Actor,
    id: &str,
    status: ExamStatus,
    now: PrimitiveDateTime,
) -> Result<Examination, EngineError> {
    require_manager(actor)?;
    let mut exam = load_examination(state, actor, id).await?;
    ensure_mutable(&exam, now.date())?;

    if exam.status != ExamStatus::Draft && status == ExamStatus::Draft {
        return Err(EngineError::state(
            "Published examinations cannot return to draft",
            status_label(exam.status),
        ));
    }

    if exam.status != status {
        state.repos().exams.update_status(&actor.school_id, id, status, now).await?;
        tracing::info!(
            examination_id = %exam.id,
            from = status_label(exam.status),
            to = status_label(status),
            "Examination status changed"
        );
        exam.status = status;
        exam.updated_at = now;
    }
    Ok(exam)
}

fn status_label(status: ExamStatus) -> &'static str {
    match status {
        ExamStatus::Draft => "draft",
        ExamStatus::Public => "public",
        ExamStatus::Private => "private",
    }
}

/// Deletes the examination and, through the store, every Result recorded for it.
pub(crate) async fn delete_examination(
    state: &AppState,
    actor: &Actor,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), EngineError> {
    require_manager(actor)?;
    let exam = load_examination(state, actor, id).await?;
    ensure_mutable(&exam, now.date())?;

    if !state.repos().exams.delete(&actor.school_id, id).await? {
        return Err(EngineError::NotFound("Examination not found".to_string()));
    }
    tracing::info!(examination_id = %id, actor_id = %actor.id, "Examination deleted");
    Ok(())
}

/// Staff see every examination; students only published (public) ones.
pub(crate) async fn get_examination(
    state: &AppState,
    actor: &Actor,
    id: &str,
) -> Result<Examination, EngineError> {
    let exam = load_examination(state, actor, id).await?;
    if !actor.is_staff() && exam.status != ExamStatus::Public {
        return Err(EngineError::NotFound("Examination not found".to_string()));
    }
    Ok(exam)
}

pub(crate) async fn list_examinations(
    state: &AppState,
    actor: &Actor,
    status: Option<ExamStatus>,
    skip: i64,
    limit: i64,
) -> Result<(Vec<Examination>, i64), EngineError> {
    let status = if actor.is_staff() { status } else { Some(ExamStatus::Public) };
    Ok(state.repos().exams.list(&actor.school_id, status, skip, limit).await?)
}

pub(crate) async fn gradable_subjects(
    state: &AppState,
    actor: &Actor,
    id: &str,
) -> Result<Vec<ExamSubject>, EngineError> {
    if !actor.can_grade() {
        return Err(EngineError::Forbidden("Grading access required"));
    }
    let exam = load_examination(state, actor, id).await?;
    Ok(visible_subjects(actor, &exam).into_iter().cloned().collect())
}

pub(crate) async fn check_invigilator_conflict(
    state: &AppState,
    actor: &Actor,
    request: &ConflictCheckRequest,
) -> Result<ConflictCheck, EngineError> {
    require_manager(actor)?;

    let teacher_id = request.teacher_id.trim();
    let sessions = state
        .repos()
        .exams
        .sessions_for_teacher(&actor.school_id, teacher_id, request.exam_date)
        .await?;
    let index = ConflictIndex::build(sessions);

    let check = has_conflict(
        &index,
        &ConflictQuery {
            teacher_id,
            date: request.exam_date,
            start_time: request.start_time,
            duration_minutes: request.duration_minutes,
            exclude_subject_id: request.exclude_subject_id.as_deref(),
        },
    );
    metrics::record_invigilator_conflicts(check.conflicting_count);
    Ok(check)
}
