mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_exam).get(handlers::list_exams))
        .route("/validate", post(handlers::validate_exam))
        .route("/invigilator-conflicts", post(handlers::check_conflict))
        .route(
            "/:exam_id",
            get(handlers::get_exam).put(handlers::update_exam).delete(handlers::delete_exam),
        )
        .route("/:exam_id/validate", post(handlers::validate_exam_update))
        .route("/:exam_id/status", axum::routing::patch(handlers::change_status))
        .route("/:exam_id/gradable-subjects", get(handlers::gradable_subjects))
}

#[cfg(test)]
mod tests;
