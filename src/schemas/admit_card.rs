use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::admit_cards::EligibilitySummary;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdmitCardRequest {
    #[serde(alias = "studentId")]
    #[validate(length(min = 1, message = "student_id must not be empty"))]
    pub(crate) student_id: String,
    #[serde(alias = "examinationId")]
    #[validate(length(min = 1, message = "examination_id must not be empty"))]
    pub(crate) examination_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct EligibilityResponse {
    #[serde(flatten)]
    pub(crate) summary: EligibilitySummary,
    pub(crate) banner: Option<String>,
}
