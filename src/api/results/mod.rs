mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::submit_result).get(handlers::list_results))
        .route("/bulk-approve", post(handlers::bulk_approve))
        .route("/bulk-reject", post(handlers::bulk_reject))
        .route("/:result_id", get(handlers::get_result))
        .route("/:result_id/approve", post(handlers::approve_result))
        .route("/:result_id/reject", post(handlers::reject_result))
        .route("/:result_id/reopen", post(handlers::reopen_result))
}

#[cfg(test)]
mod tests;
