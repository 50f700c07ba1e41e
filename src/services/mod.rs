pub(crate) mod access;
pub(crate) mod admit_cards;
pub(crate) mod errors;
pub(crate) mod exam_authoring;
pub(crate) mod exam_validation;
pub(crate) mod result_scoring;
pub(crate) mod result_submission;
pub(crate) mod result_workflow;
pub(crate) mod schedule_conflicts;
pub(crate) mod template_renderer;
