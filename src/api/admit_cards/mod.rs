mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::download_admit_card))
        .route("/eligibility/:student_id", get(handlers::eligibility))
}

#[cfg(test)]
mod tests;
