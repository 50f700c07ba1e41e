use serde::Serialize;
use sha2::{Digest, Sha256};
use time::PrimitiveDateTime;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::{format_clock, format_date, format_primitive};
use crate::db::models::{Examination, Fee, StudentProfile};
use crate::db::types::{ExamStatus, ExamType, FeeStatus};
use crate::services::access::Actor;
use crate::services::errors::EngineError;
use crate::services::result_scoring::round2;
use crate::services::schedule_conflicts::TimeInterval;
use crate::services::template_renderer::RenderedDocument;

pub(crate) const ADMIT_CARD_TEMPLATE: &str = "admit_card";

/// Fee standing of one student as seen by the admit-card gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct EligibilitySummary {
    pub(crate) student_id: String,
    pub(crate) eligible: bool,
    /// Fees that block issuance.
    pub(crate) pending_fee_count: usize,
    pub(crate) pending_amount: f64,
    pub(crate) overdue_fee_count: usize,
    pub(crate) partial_fee_count: usize,
    pub(crate) partial_amount: f64,
}

fn blocks(status: FeeStatus, block_on_partial: bool) -> bool {
    match status {
        FeeStatus::Pending | FeeStatus::Overdue => true,
        FeeStatus::Partial => block_on_partial,
        FeeStatus::Paid => false,
    }
}

pub(crate) fn evaluate_eligibility(
    student_id: &str,
    fees: &[Fee],
    block_on_partial: bool,
) -> EligibilitySummary {
    let blocking: Vec<&Fee> =
        fees.iter().filter(|fee| blocks(fee.status, block_on_partial)).collect();
    let partial: Vec<&Fee> = fees.iter().filter(|fee| fee.status == FeeStatus::Partial).collect();

    EligibilitySummary {
        student_id: student_id.to_string(),
        eligible: blocking.is_empty(),
        pending_fee_count: blocking.len(),
        pending_amount: round2(blocking.iter().map(|fee| fee.outstanding()).sum()),
        overdue_fee_count: fees.iter().filter(|fee| fee.status == FeeStatus::Overdue).count(),
        partial_fee_count: partial.len(),
        partial_amount: round2(partial.iter().map(|fee| fee.outstanding()).sum()),
    }
}

/// Text for the dashboard banner shown before a student tries to download a card.
pub(crate) fn dashboard_banner(summary: &EligibilitySummary) -> Option<String> {
    if summary.eligible {
        return None;
    }
    Some(format!(
        "Admit card unavailable: {} unpaid fee(s) totalling {:.2} must be cleared first",
        summary.pending_fee_count, summary.pending_amount
    ))
}

pub(crate) fn verification_code(school_id: &str, examination_id: &str, student_id: &str) -> String {
    let digest = Sha256::digest(format!("{school_id}:{examination_id}:{student_id}").as_bytes());
    hex::encode(digest).chars().take(12).collect()
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AdmitCardSubject {
    pub(crate) name: String,
    pub(crate) exam_date: String,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) duration_minutes: i32,
    pub(crate) room: Option<String>,
}

/// Data bag handed to the template renderer.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AdmitCardData {
    pub(crate) school_id: String,
    pub(crate) examination_id: String,
    pub(crate) examination_name: String,
    pub(crate) examination_code: Option<String>,
    pub(crate) exam_type: ExamType,
    pub(crate) class_name: String,
    pub(crate) section: Option<String>,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) roll_number: Option<String>,
    pub(crate) exam_start_date: String,
    pub(crate) exam_end_date: String,
    pub(crate) subjects: Vec<AdmitCardSubject>,
    pub(crate) verification_code: String,
    pub(crate) issued_at: String,
}

pub(crate) fn admit_card_data(
    exam: &Examination,
    student: &StudentProfile,
    issued_at: PrimitiveDateTime,
) -> AdmitCardData {
    let subjects = exam
        .subjects
        .iter()
        .map(|subject| {
            let slot = TimeInterval::from_slot(
                subject.exam_date,
                subject.start_time,
                subject.duration_minutes,
            );
            AdmitCardSubject {
                name: subject.name.clone(),
                exam_date: format_date(subject.exam_date),
                start_time: format_clock(subject.start_time),
                end_time: format_clock(slot.end().time()),
                duration_minutes: subject.duration_minutes,
                room: subject.room.clone(),
            }
        })
        .collect();

    AdmitCardData {
        school_id: exam.school_id.clone(),
        examination_id: exam.id.clone(),
        examination_name: exam.name.clone(),
        examination_code: exam.code.clone(),
        exam_type: exam.exam_type,
        class_name: exam.class_name.clone(),
        section: student.section.clone(),
        student_id: student.id.clone(),
        student_name: student.full_name.clone(),
        roll_number: student.roll_number.clone(),
        exam_start_date: format_date(exam.exam_start_date),
        exam_end_date: format_date(exam.exam_end_date),
        subjects,
        verification_code: verification_code(&exam.school_id, &exam.id, &student.id),
        issued_at: format_primitive(issued_at),
    }
}

fn enrolled_in(exam: &Examination, student: &StudentProfile) -> bool {
    if !student.class_name.trim().eq_ignore_ascii_case(exam.class_name.trim()) {
        return false;
    }
    if exam.sections.is_empty() {
        return true;
    }
    student.section.as_deref().is_some_and(|section| {
        exam.sections.iter().any(|listed| listed.trim().eq_ignore_ascii_case(section.trim()))
    })
}

async fn load_student(
    state: &AppState,
    actor: &Actor,
    student_id: &str,
) -> Result<StudentProfile, EngineError> {
    if !actor.can_act_for_student(student_id) {
        return Err(EngineError::Forbidden("Students may only access their own admit card"));
    }
    state
        .repos()
        .directory
        .find_student(&actor.school_id, student_id)
        .await?
        .ok_or_else(|| EngineError::NotFound("Student not found".to_string()))
}

/// Reads the fee ledger on every call; eligibility is never cached.
async fn summarize(
    state: &AppState,
    school_id: &str,
    student: &StudentProfile,
) -> Result<EligibilitySummary, EngineError> {
    let fees = state.repos().fees.fees_for_student(school_id, &student.id).await?;
    Ok(evaluate_eligibility(&student.id, &fees, state.settings().admit_card().block_on_partial))
}

pub(crate) async fn check_eligibility(
    state: &AppState,
    actor: &Actor,
    student_id: &str,
) -> Result<EligibilitySummary, EngineError> {
    let student = load_student(state, actor, student_id).await?;
    summarize(state, &actor.school_id, &student).await
}

#[derive(Debug)]
pub(crate) struct AdmitCard {
    pub(crate) document: RenderedDocument,
    pub(crate) verification_code: String,
    pub(crate) filename: String,
}

pub(crate) async fn generate_admit_card(
    state: &AppState,
    actor: &Actor,
    student_id: &str,
    examination_id: &str,
    now: PrimitiveDateTime,
) -> Result<AdmitCard, EngineError> {
    let student = load_student(state, actor, student_id).await?;
    let summary = summarize(state, &actor.school_id, &student).await?;
    if !summary.eligible {
        metrics::record_admit_card("blocked");
        tracing::info!(
            student_id,
            examination_id,
            pending_fee_count = summary.pending_fee_count,
            "Admit card refused for outstanding fees"
        );
        return Err(EngineError::EligibilityBlocked(summary));
    }

    let exam = state
        .repos()
        .exams
        .find(&actor.school_id, examination_id)
        .await?
        .ok_or_else(|| EngineError::NotFound("Examination not found".to_string()))?;
    if exam.status == ExamStatus::Draft {
        return Err(EngineError::state(
            "Admit cards are not issued for draft examinations",
            "draft",
        ));
    }

    if !enrolled_in(&exam, &student) {
        return Err(EngineError::invalid(
            "student_id",
            "student is not enrolled in the examination's class and section",
        ));
    }

    let data = admit_card_data(&exam, &student, now);
    let payload = serde_json::to_value(&data)
        .map_err(|e| EngineError::Rendering(format!("failed to encode admit card data: {e}")))?;
    let document = state.renderer().render(ADMIT_CARD_TEMPLATE, &payload).await.map_err(|e| {
        metrics::record_admit_card("render_failed");
        EngineError::Rendering(format!("{e:#}"))
    })?;

    metrics::record_admit_card("issued");
    tracing::info!(student_id, examination_id, "Admit card issued");

    let extension =
        if document.content_type.starts_with("application/pdf") { "pdf" } else { "txt" };
    let label = exam.code.as_deref().unwrap_or(&exam.id);
    Ok(AdmitCard {
        filename: format!("admit-card-{label}-{}.{extension}", student.id),
        verification_code: data.verification_code,
        document,
    })
}
