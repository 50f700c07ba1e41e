use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::db::models::ResultRecord;
use crate::db::types::ApprovalStatus;
use crate::services::access::Actor;
use crate::services::errors::EngineError;

/// Workflow position of a Result, derived from `is_draft` and `approval_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum WorkflowState {
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl WorkflowState {
    pub(crate) fn of(record: &ResultRecord) -> Self {
        if record.is_draft {
            return Self::Draft;
        }
        match record.approval_status {
            Some(ApprovalStatus::Approved) => Self::Approved,
            Some(ApprovalStatus::Rejected) => Self::Rejected,
            Some(ApprovalStatus::Pending) | None => Self::Pending,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApproveOutcome {
    Approved,
    AlreadyApproved,
}

fn require_reason(reason: &str) -> Result<String, EngineError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid("reason", "reason is required"));
    }
    if trimmed.chars().count() > 500 {
        return Err(EngineError::invalid("reason", "reason must be at most 500 characters"));
    }
    Ok(trimmed.to_string())
}

/// Moves a Result into Draft or Pending after marks were written. Approved
/// results are locked until reopened.
pub(crate) fn record_submission(
    record: &mut ResultRecord,
    is_draft: bool,
    now: PrimitiveDateTime,
) -> Result<(), EngineError> {
    let current = WorkflowState::of(record);
    if current == WorkflowState::Approved {
        return Err(EngineError::state(
            "Approved results must be reopened before marks can change",
            current.as_str(),
        ));
    }

    if is_draft {
        record.is_draft = true;
        record.approval_status = None;
    } else {
        record.is_draft = false;
        record.approval_status = Some(ApprovalStatus::Pending);
        record.rejection_reason = None;
    }
    record.updated_at = now;
    Ok(())
}

/// Approving an already approved result succeeds without changes so bulk
/// retries stay harmless.
pub(crate) fn approve(
    record: &mut ResultRecord,
    actor: &Actor,
    now: PrimitiveDateTime,
) -> Result<ApproveOutcome, EngineError> {
    if !actor.can_approve_results() {
        return Err(EngineError::Forbidden("Exam controller or admin access required"));
    }

    match WorkflowState::of(record) {
        WorkflowState::Approved => Ok(ApproveOutcome::AlreadyApproved),
        WorkflowState::Pending => {
            record.approval_status = Some(ApprovalStatus::Approved);
            record.reviewed_by = Some(actor.id.clone());
            record.reviewed_at = Some(now);
            record.updated_at = now;
            Ok(ApproveOutcome::Approved)
        }
        other => Err(EngineError::state("Only pending results can be approved", other.as_str())),
    }
}

pub(crate) fn reject(
    record: &mut ResultRecord,
    actor: &Actor,
    reason: &str,
    now: PrimitiveDateTime,
) -> Result<(), EngineError> {
    if !actor.can_approve_results() {
        return Err(EngineError::Forbidden("Exam controller or admin access required"));
    }
    let reason = require_reason(reason)?;

    let current = WorkflowState::of(record);
    if current != WorkflowState::Pending {
        return Err(EngineError::state("Only pending results can be rejected", current.as_str()));
    }

    record.approval_status = Some(ApprovalStatus::Rejected);
    record.rejection_reason = Some(reason);
    record.reviewed_by = Some(actor.id.clone());
    record.reviewed_at = Some(now);
    record.updated_at = now;
    Ok(())
}

/// Returns an approved result to Draft so a grading error can be corrected.
pub(crate) fn reopen(
    record: &mut ResultRecord,
    actor: &Actor,
    reason: &str,
    now: PrimitiveDateTime,
) -> Result<(), EngineError> {
    if !actor.can_reopen_results() {
        return Err(EngineError::Forbidden("Admin access required to reopen results"));
    }
    let reason = require_reason(reason)?;

    let current = WorkflowState::of(record);
    if current != WorkflowState::Approved {
        return Err(EngineError::state("Only approved results can be reopened", current.as_str()));
    }

    record.is_draft = true;
    record.approval_status = None;
    record.reopened_by = Some(actor.id.clone());
    record.reopened_at = Some(now);
    record.reopen_reason = Some(reason);
    record.updated_at = now;
    Ok(())
}
