use axum::extract::{Path, Query, State};
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentActor;
use crate::api::pagination::{PaginatedResponse, Window};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories::ResultFilter;
use crate::schemas::result::{
    BulkActionRequest, BulkActionResponse, ReasonRequest, ResultListQuery, ResultResponse,
    SubmitResultRequest,
};
use crate::services::access::Actor;
use crate::services::result_submission::{self, ReviewAction};

pub(super) async fn submit_result(
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Json(payload): Json<SubmitResultRequest>,
) -> Result<Json<ResultResponse>, ApiError> {
    payload.validate()?;

    let record =
        result_submission::submit_result(&state, &actor, payload, primitive_now_utc()).await?;
    let view = result_submission::read_result(&state, &actor, &record.id).await?;
    Ok(Json(view))
}

pub(super) async fn list_results(
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Query(params): Query<ResultListQuery>,
) -> Result<Json<PaginatedResponse<ResultResponse>>, ApiError> {
    let window = Window::clamp(params.skip, params.limit);

    let filter = ResultFilter {
        examination_id: params.examination_id.as_deref(),
        student_id: params.student_id.as_deref(),
        state: params.state,
        examination_ids: None,
    };
    let page =
        result_submission::list_results(&state, &actor, filter, window.skip, window.limit).await?;

    Ok(Json(window.page(page.items, page.total_count)))
}

pub(super) async fn get_result(
    Path(result_id): Path<String>,
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
) -> Result<Json<ResultResponse>, ApiError> {
    let view = result_submission::read_result(&state, &actor, &result_id).await?;
    Ok(Json(view))
}

async fn review(
    state: &AppState,
    actor: &Actor,
    result_id: &str,
    action: ReviewAction,
) -> Result<Json<ResultResponse>, ApiError> {
    let record =
        result_submission::transition_result(state, actor, result_id, action, primitive_now_utc())
            .await?;
    Ok(Json(ResultResponse::full(&record)))
}

pub(super) async fn approve_result(
    Path(result_id): Path<String>,
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
) -> Result<Json<ResultResponse>, ApiError> {
    review(&state, &actor, &result_id, ReviewAction::Approve).await
}

pub(super) async fn reject_result(
    Path(result_id): Path<String>,
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Json(payload): Json<ReasonRequest>,
) -> Result<Json<ResultResponse>, ApiError> {
    review(&state, &actor, &result_id, ReviewAction::Reject { reason: payload.reason }).await
}

pub(super) async fn reopen_result(
    Path(result_id): Path<String>,
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Json(payload): Json<ReasonRequest>,
) -> Result<Json<ResultResponse>, ApiError> {
    review(&state, &actor, &result_id, ReviewAction::Reopen { reason: payload.reason }).await
}

pub(super) async fn bulk_approve(
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Json(payload): Json<BulkActionRequest>,
) -> Result<Json<BulkActionResponse>, ApiError> {
    let outcomes = result_submission::bulk_transition(
        &state,
        &actor,
        payload.result_ids,
        ReviewAction::Approve,
        primitive_now_utc(),
    )
    .await?;
    Ok(Json(outcomes.into()))
}

pub(super) async fn bulk_reject(
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Json(payload): Json<BulkActionRequest>,
) -> Result<Json<BulkActionResponse>, ApiError> {
    let reason = payload.reason.unwrap_or_default();
    let outcomes = result_submission::bulk_transition(
        &state,
        &actor,
        payload.result_ids,
        ReviewAction::Reject { reason },
        primitive_now_utc(),
    )
    .await?;
    Ok(Json(outcomes.into()))
}
