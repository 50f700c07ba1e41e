use axum::extract::{Path, State};
use axum::http::{header, HeaderName};
use axum::response::{IntoResponse, Response};
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentActor;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::schemas::admit_card::{AdmitCardRequest, EligibilityResponse};
use crate::services::admit_cards;

const VERIFICATION_HEADER: HeaderName = HeaderName::from_static("x-verification-code");

pub(super) async fn eligibility(
    Path(student_id): Path<String>,
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
) -> Result<Json<EligibilityResponse>, ApiError> {
    let summary = admit_cards::check_eligibility(&state, &actor, &student_id).await?;
    let banner = admit_cards::dashboard_banner(&summary);
    Ok(Json(EligibilityResponse { summary, banner }))
}

pub(super) async fn download_admit_card(
    CurrentActor(actor): CurrentActor,
    State(state): State<AppState>,
    Json(payload): Json<AdmitCardRequest>,
) -> Result<Response, ApiError> {
    payload.validate()?;

    let card = admit_cards::generate_admit_card(
        &state,
        &actor,
        payload.student_id.trim(),
        payload.examination_id.trim(),
        primitive_now_utc(),
    )
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, card.document.content_type),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", card.filename)),
            (VERIFICATION_HEADER, card.verification_code),
        ],
        card.document.body,
    )
        .into_response())
}
