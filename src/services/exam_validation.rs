use std::collections::HashMap;

use time::{Date, Time};
use validator::Validate;

use crate::db::models::subject_key;
use crate::schemas::exam::{ExaminationDraft, SubjectDraft};
use crate::services::errors::ValidationErrors;

/// Inputs the validator needs besides the draft itself. `today` is passed in
/// rather than read from a clock.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ValidationContext {
    pub(crate) today: Date,
    /// Start date already stored for the examination being updated. An unchanged
    /// start date is not re-checked against `today`.
    pub(crate) original_start_date: Option<Date>,
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |value| value.trim().is_empty())
}

/// Runs every definition check and returns all violations together.
pub(crate) fn validate_examination(
    draft: &ExaminationDraft,
    context: &ValidationContext,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if is_blank(draft.name.as_deref()) {
        errors.add("name", "name is required");
    }
    if draft.exam_type.is_none() {
        errors.add("exam_type", "exam_type is required");
    }
    if draft.exam_start_date.is_none() {
        errors.add("exam_start_date", "exam_start_date is required");
    }
    if draft.exam_end_date.is_none() {
        errors.add("exam_end_date", "exam_end_date is required");
    }
    if let Err(field_errors) = draft.validate() {
        errors.absorb(None, field_errors);
    }

    if is_blank(draft.class_name.as_deref()) {
        errors.add("class_name", "class_name must not be empty");
    }
    if draft.sections.is_empty() {
        errors.add("sections", "at least one section is required");
    }
    for (index, section) in draft.sections.iter().enumerate() {
        if section.trim().is_empty() {
            errors.add(format!("sections[{index}]"), "section must not be empty");
        }
    }

    if let Some(start) = draft.exam_start_date {
        let unchanged = context.original_start_date == Some(start);
        if start < context.today && !unchanged {
            errors.add("exam_start_date", "exam_start_date cannot be in the past");
        }
    }
    let range = match (draft.exam_start_date, draft.exam_end_date) {
        (Some(start), Some(end)) if end < start => {
            errors.add("exam_end_date", "exam_end_date must be on or after exam_start_date");
            None
        }
        (Some(start), Some(end)) => Some((start, end)),
        _ => None,
    };

    if draft.subjects.is_empty() {
        errors.add("subjects", "at least one subject is required");
    }

    let mut slots: HashMap<(Date, Time), usize> = HashMap::new();
    let mut names: HashMap<String, usize> = HashMap::new();
    for (index, subject) in draft.subjects.iter().enumerate() {
        validate_subject(index, subject, range, &mut errors);

        if let Some(name) = subject.name.as_deref().filter(|name| !name.trim().is_empty()) {
            if let Some(first) = names.get(&subject_key(name)) {
                errors.add(
                    format!("subjects[{index}].name"),
                    format!("subjects[{first}] already uses this subject name"),
                );
            } else {
                names.insert(subject_key(name), index);
            }
        }

        if let (Some(date), Some(start_time)) = (subject.exam_date, subject.start_time) {
            if let Some(first) = slots.get(&(date, start_time)) {
                errors.add(
                    format!("subjects[{index}].start_time"),
                    format!("subjects[{first}] is already scheduled at this date and start time"),
                );
            } else {
                slots.insert((date, start_time), index);
            }
        }
    }

    errors.into_result()
}

fn validate_subject(
    index: usize,
    subject: &SubjectDraft,
    range: Option<(Date, Date)>,
    errors: &mut ValidationErrors,
) {
    let prefix = format!("subjects[{index}]");

    if is_blank(subject.name.as_deref()) {
        errors.add(format!("{prefix}.name"), "name is required");
    }
    let required = [
        ("exam_date", subject.exam_date.is_none()),
        ("start_time", subject.start_time.is_none()),
        ("duration_minutes", subject.duration_minutes.is_none()),
        ("max_marks", subject.max_marks.is_none()),
        ("total_marks", subject.total_marks.is_none()),
        ("passing_marks", subject.passing_marks.is_none()),
    ];
    for (field, missing) in required {
        if missing {
            errors.add(format!("{prefix}.{field}"), format!("{field} is required"));
        }
    }

    if let Err(field_errors) = subject.validate() {
        errors.absorb(Some(&prefix), field_errors);
    }

    if let (Some(passing), Some(total)) = (subject.passing_marks, subject.total_marks) {
        if passing > total {
            errors.add(
                format!("{prefix}.passing_marks"),
                "passing_marks cannot exceed total_marks",
            );
        }
    }

    if let (Some(date), Some((start, end))) = (subject.exam_date, range) {
        if date < start || date > end {
            errors.add(
                format!("{prefix}.exam_date"),
                "exam_date must fall within the examination date range",
            );
        }
    }

    for (slot, invigilator) in subject.invigilators.iter().enumerate() {
        let key = format!("{prefix}.invigilators[{slot}]");
        if is_blank(invigilator.teacher_id.as_deref()) && is_blank(invigilator.name.as_deref()) {
            errors.add(key.clone(), "invigilator needs a teacher_id or a name");
        }
        if let Err(field_errors) = invigilator.validate() {
            errors.absorb(Some(&key), field_errors);
        }
    }
}
