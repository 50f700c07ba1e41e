use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::services::admit_cards::EligibilitySummary;

/// Field-keyed validation messages. Checks append here instead of failing fast
/// so callers can show every problem at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub(crate) struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub(crate) fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub(crate) fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub(crate) fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Folds `validator` derive output in, prefixing each field (e.g. `subjects[2]`).
    pub(crate) fn absorb(&mut self, prefix: Option<&str>, errors: validator::ValidationErrors) {
        for (field, field_errors) in errors.field_errors() {
            let key = match prefix {
                Some(prefix) => format!("{prefix}.{field}"),
                None => field.to_string(),
            };
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid ({})", error.code));
                self.add(key.clone(), message);
            }
        }
    }

    pub(crate) fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join("; ")))
            .collect();
        write!(f, "{}", rendered.join(", "))
    }
}

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub(crate) enum EngineError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("{message} (current state: {current})")]
    State { message: String, current: String },
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(String),
    #[error("admit card blocked by {} outstanding fee(s)", .0.pending_fee_count)]
    EligibilityBlocked(EligibilitySummary),
    #[error("template rendering failed: {0}")]
    Rendering(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub(crate) fn state(message: impl Into<String>, current: impl Into<String>) -> Self {
        Self::State { message: message.into(), current: current.into() }
    }

    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }

    /// Short machine-readable label, used for bulk outcome entries and metrics.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::State { .. } => "state_error",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::EligibilityBlocked(_) => "eligibility_blocked",
            Self::Rendering(_) | Self::Store(_) => "internal",
        }
    }
}

impl From<ValidationErrors> for EngineError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}
