use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentActor;
use crate::api::pagination::{PaginatedResponse, Window};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::schemas::exam::{
    ConflictCheckRequest, ExamListQuery, ExamStatusUpdate, ExaminationDraft, ExaminationResponse,
    ExaminationSummaryResponse, ExaminationWriteResponse, GradableSubjectResponse,
    ValidationReport,
};
use crate::services::errors::ValidationErrors;
use crate::services::exam_authoring;
use crate::services::schedule_conflicts::ConflictCheck;

pub(super) async fn validate_exam(
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Json(draft): Json<ExaminationDraft>,
) -> Result<Json<ValidationReport>, ApiError> {
    let today = primitive_now_utc().date();
    let report = exam_authoring::validate_draft(&state, &actor, &draft, None, today).await?;
    Ok(Json(report))
}

pub(super) async fn validate_exam_update(
    Path(exam_id): Path<String>,
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Json(draft): Json<ExaminationDraft>,
) -> Result<Json<ValidationReport>, ApiError> {
    let today = primitive_now_utc().date();
    let report =
        exam_authoring::validate_draft(&state, &actor, &draft, Some(&exam_id), today).await?;
    Ok(Json(report))
}

pub(super) async fn create_exam(
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Json(draft): Json<ExaminationDraft>,
) -> Result<(StatusCode, Json<ExaminationWriteResponse>), ApiError> {
    let (exam, conflicts) =
        exam_authoring::create_examination(&state, &actor, draft, primitive_now_utc()).await?;

    Ok((
        StatusCode::CREATED,
        Json(ExaminationWriteResponse { examination: (&exam).into(), conflicts }),
    ))
}

pub(super) async fn list_exams(
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Query(params): Query<ExamListQuery>,
) -> Result<Json<PaginatedResponse<ExaminationSummaryResponse>>, ApiError> {
    let window = Window::clamp(params.skip, params.limit);

    let (exams, total_count) = exam_authoring::list_examinations(
        &state,
        &actor,
        params.status,
        window.skip,
        window.limit,
    )
    .await?;
    let items = exams.iter().map(ExaminationSummaryResponse::from).collect();

    Ok(Json(window.page(items, total_count)))
}

pub(super) async fn get_exam(
    Path(exam_id): Path<String>,
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
) -> Result<Json<ExaminationResponse>, ApiError> {
    let exam = exam_authoring::get_examination(&state, &actor, &exam_id).await?;
    Ok(Json((&exam).into()))
}

pub(super) async fn update_exam(
    Path(exam_id): Path<String>,
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Json(draft): Json<ExaminationDraft>,
) -> Result<Json<ExaminationWriteResponse>, ApiError> {
    let (exam, conflicts) =
        exam_authoring::update_examination(&state, &actor, &exam_id, draft, primitive_now_utc())
            .await?;

    Ok(Json(ExaminationWriteResponse { examination: (&exam).into(), conflicts }))
}

pub(super) async fn change_status(
    Path(exam_id): Path<String>,
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Json(payload): Json<ExamStatusUpdate>,
) -> Result<Json<ExaminationResponse>, ApiError> {
    let exam = exam_authoring::change_status(
        &state,
        &actor,
        &exam_id,
        payload.status,
        primitive_now_utc(),
    )
    .await?;
    Ok(Json((&exam).into()))
}

pub(super) async fn delete_exam(
    Path(exam_id): Path<String>,
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    exam_authoring::delete_examination(&state, &actor, &exam_id, primitive_now_utc()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn gradable_subjects(
    Path(exam_id): Path<String>,
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
) -> Result<Json<Vec<GradableSubjectResponse>>, ApiError> {
    let subjects = exam_authoring::gradable_subjects(&state, &actor, &exam_id).await?;
    Ok(Json(subjects.iter().map(GradableSubjectResponse::from).collect()))
}

pub(super) async fn check_conflict(
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Json(payload): Json<ConflictCheckRequest>,
) -> Result<Json<ConflictCheck>, ApiError> {
    payload.validate()?;
    if payload.teacher_id.trim().is_empty() {
        return Err(ApiError::Validation(ValidationErrors::single(
            "teacher_id",
            "teacher_id must not be empty",
        )));
    }

    let check = exam_authoring::check_invigilator_conflict(&state, &actor, &payload).await?;
    Ok(Json(check))
}
