use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::admit_cards::EligibilitySummary;
use crate::services::errors::{EngineError, ValidationErrors};

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<ValidationErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fees: Option<EligibilitySummary>,
}

impl ErrorResponse {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            detail: detail.into(),
            errors: None,
            current_state: None,
            fees: None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    NotFound(String),
    Validation(ValidationErrors),
    State { message: String, current: String },
    EligibilityBlocked(EligibilitySummary),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(errors) => Self::Validation(errors),
            EngineError::State { message, current } => Self::State { message, current },
            EngineError::Forbidden(message) => Self::Forbidden(message),
            EngineError::NotFound(message) => Self::NotFound(message),
            EngineError::EligibilityBlocked(summary) => Self::EligibilityBlocked(summary),
            EngineError::Rendering(message) => {
                Self::internal(message, "Failed to render document")
            }
            EngineError::Store(err) => Self::internal(err, "Storage operation failed"),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut collected = ValidationErrors::default();
        collected.absorb(None, errors);
        Self::Validation(collected)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let status = StatusCode::UNAUTHORIZED;
                let mut response =
                    (status, Json(ErrorResponse::new(status, message))).into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Forbidden(message) => {
                let status = StatusCode::FORBIDDEN;
                (status, Json(ErrorResponse::new(status, message))).into_response()
            }
            ApiError::NotFound(message) => {
                let status = StatusCode::NOT_FOUND;
                (status, Json(ErrorResponse::new(status, message))).into_response()
            }
            ApiError::Validation(errors) => {
                let status = StatusCode::UNPROCESSABLE_ENTITY;
                let body = ErrorResponse {
                    errors: Some(errors),
                    ..ErrorResponse::new(status, "Validation failed")
                };
                (status, Json(body)).into_response()
            }
            ApiError::State { message, current } => {
                let status = StatusCode::CONFLICT;
                let body = ErrorResponse {
                    current_state: Some(current),
                    ..ErrorResponse::new(status, message)
                };
                (status, Json(body)).into_response()
            }
            ApiError::EligibilityBlocked(summary) => {
                let status = StatusCode::FORBIDDEN;
                let detail = format!(
                    "Admit card blocked: {} outstanding fee(s) totalling {:.2}",
                    summary.pending_fee_count, summary.pending_amount
                );
                let body =
                    ErrorResponse { fees: Some(summary), ..ErrorResponse::new(status, detail) };
                (status, Json(body)).into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, Json(ErrorResponse::new(status, message))).into_response()
            }
        }
    }
}
