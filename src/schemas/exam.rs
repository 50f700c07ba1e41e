use serde::{Deserialize, Serialize};
use time::{Date, Time};
use validator::Validate;

use crate::api::pagination::default_limit;
use crate::core::time::{
    format_clock, format_date, format_primitive, serde_clock, serde_date, serde_option_clock,
    serde_option_date,
};
use crate::db::models::{ExamSubject, Examination, InvigilatorAssignment};
use crate::db::types::{ExamStatus, ExamType, InvigilatorRole};
use crate::services::errors::ValidationErrors;
use crate::services::schedule_conflicts::InvigilatorConflict;

fn default_invigilator_role() -> InvigilatorRole {
    InvigilatorRole::Invigilator
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub(crate) struct InvigilatorDraft {
    #[serde(default, alias = "teacherId")]
    pub(crate) teacher_id: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "name must be at most 100 characters"))]
    pub(crate) name: Option<String>,
    #[serde(default = "default_invigilator_role")]
    pub(crate) role: InvigilatorRole,
}

/// A subject session as authored. Everything is optional at the wire level so
/// missing fields surface as field errors instead of a JSON rejection.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub(crate) struct SubjectDraft {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub(crate) name: Option<String>,
    #[serde(default, alias = "examDate", with = "serde_option_date")]
    pub(crate) exam_date: Option<Date>,
    #[serde(default, alias = "startTime", with = "serde_option_clock")]
    pub(crate) start_time: Option<Time>,
    #[serde(default, alias = "durationMinutes", alias = "duration")]
    #[validate(range(min = 30, max = 480, message = "duration must be 30-480 minutes"))]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default)]
    pub(crate) room: Option<String>,
    #[serde(default, alias = "maxMarks")]
    #[validate(range(min = 1, max = 1000, message = "max_marks must be 1-1000"))]
    pub(crate) max_marks: Option<i32>,
    #[serde(default, alias = "totalMarks")]
    #[validate(range(min = 1, max = 1000, message = "total_marks must be 1-1000"))]
    pub(crate) total_marks: Option<i32>,
    #[serde(default, alias = "passingMarks")]
    #[validate(range(min = 0, message = "passing_marks must be non-negative"))]
    pub(crate) passing_marks: Option<i32>,
    #[serde(default, alias = "teacherId")]
    pub(crate) teacher_id: Option<String>,
    #[serde(default)]
    pub(crate) invigilators: Vec<InvigilatorDraft>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub(crate) struct ExaminationDraft {
    #[serde(default)]
    #[validate(length(min = 3, max = 100, message = "name must be 3-100 characters"))]
    pub(crate) name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 2, max = 20, message = "code must be 2-20 characters"))]
    pub(crate) code: Option<String>,
    #[serde(default, alias = "examType", alias = "type")]
    pub(crate) exam_type: Option<ExamType>,
    #[serde(default, alias = "className", alias = "class")]
    pub(crate) class_name: Option<String>,
    #[serde(default)]
    pub(crate) sections: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 500, message = "description must be at most 500 characters"))]
    pub(crate) description: Option<String>,
    #[serde(default, alias = "examStartDate", with = "serde_option_date")]
    pub(crate) exam_start_date: Option<Date>,
    #[serde(default, alias = "examEndDate", with = "serde_option_date")]
    pub(crate) exam_end_date: Option<Date>,
    #[serde(default)]
    pub(crate) subjects: Vec<SubjectDraft>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExamStatusUpdate {
    pub(crate) status: ExamStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExamListQuery {
    #[serde(default)]
    pub(crate) status: Option<ExamStatus>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ConflictCheckRequest {
    #[serde(alias = "teacherId")]
    #[validate(length(min = 1, message = "teacher_id must not be empty"))]
    pub(crate) teacher_id: String,
    #[serde(alias = "examDate", alias = "date", with = "serde_date")]
    pub(crate) exam_date: Date,
    #[serde(alias = "startTime", with = "serde_clock")]
    pub(crate) start_time: Time,
    #[serde(alias = "durationMinutes", alias = "duration")]
    #[validate(range(min = 1, max = 1440, message = "duration_minutes must be 1-1440"))]
    pub(crate) duration_minutes: i32,
    #[serde(default, alias = "excludeSubjectId")]
    pub(crate) exclude_subject_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InvigilatorResponse {
    pub(crate) teacher_id: Option<String>,
    pub(crate) name: String,
    pub(crate) role: InvigilatorRole,
}

impl From<&InvigilatorAssignment> for InvigilatorResponse {
    fn from(assignment: &InvigilatorAssignment) -> Self {
        Self {
            teacher_id: assignment.teacher_id.clone(),
            name: assignment.name.clone(),
            role: assignment.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamSubjectResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) exam_date: String,
    pub(crate) start_time: String,
    pub(crate) duration_minutes: i32,
    pub(crate) room: Option<String>,
    pub(crate) max_marks: i32,
    pub(crate) total_marks: i32,
    pub(crate) passing_marks: i32,
    pub(crate) teacher_id: Option<String>,
    pub(crate) invigilators: Vec<InvigilatorResponse>,
}

impl From<&ExamSubject> for ExamSubjectResponse {
    fn from(subject: &ExamSubject) -> Self {
        Self {
            id: subject.id.clone(),
            name: subject.name.clone(),
            exam_date: format_date(subject.exam_date),
            start_time: format_clock(subject.start_time),
            duration_minutes: subject.duration_minutes,
            room: subject.room.clone(),
            max_marks: subject.max_marks,
            total_marks: subject.total_marks,
            passing_marks: subject.passing_marks,
            teacher_id: subject.teacher_id.clone(),
            invigilators: subject.invigilators.0.iter().map(InvigilatorResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExaminationResponse {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) name: String,
    pub(crate) code: Option<String>,
    pub(crate) exam_type: ExamType,
    pub(crate) class_name: String,
    pub(crate) sections: Vec<String>,
    pub(crate) description: Option<String>,
    pub(crate) exam_start_date: String,
    pub(crate) exam_end_date: String,
    pub(crate) status: ExamStatus,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    pub(crate) subjects: Vec<ExamSubjectResponse>,
}

impl From<&Examination> for ExaminationResponse {
    fn from(exam: &Examination) -> Self {
        Self {
            id: exam.id.clone(),
            school_id: exam.school_id.clone(),
            name: exam.name.clone(),
            code: exam.code.clone(),
            exam_type: exam.exam_type,
            class_name: exam.class_name.clone(),
            sections: exam.sections.clone(),
            description: exam.description.clone(),
            exam_start_date: format_date(exam.exam_start_date),
            exam_end_date: format_date(exam.exam_end_date),
            status: exam.status,
            created_by: exam.created_by.clone(),
            created_at: format_primitive(exam.created_at),
            updated_at: format_primitive(exam.updated_at),
            subjects: exam.subjects.iter().map(ExamSubjectResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExaminationSummaryResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) code: Option<String>,
    pub(crate) exam_type: ExamType,
    pub(crate) class_name: String,
    pub(crate) sections: Vec<String>,
    pub(crate) exam_start_date: String,
    pub(crate) exam_end_date: String,
    pub(crate) status: ExamStatus,
    pub(crate) subject_count: usize,
}

impl From<&Examination> for ExaminationSummaryResponse {
    fn from(exam: &Examination) -> Self {
        Self {
            id: exam.id.clone(),
            name: exam.name.clone(),
            code: exam.code.clone(),
            exam_type: exam.exam_type,
            class_name: exam.class_name.clone(),
            sections: exam.sections.clone(),
            exam_start_date: format_date(exam.exam_start_date),
            exam_end_date: format_date(exam.exam_end_date),
            status: exam.status,
            subject_count: exam.subjects.len(),
        }
    }
}

/// Saved examination plus advisory invigilator double-bookings.
#[derive(Debug, Serialize)]
pub(crate) struct ExaminationWriteResponse {
    pub(crate) examination: ExaminationResponse,
    pub(crate) conflicts: Vec<InvigilatorConflict>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ValidationReport {
    pub(crate) valid: bool,
    pub(crate) errors: ValidationErrors,
    pub(crate) conflicts: Vec<InvigilatorConflict>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradableSubjectResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) exam_date: String,
    pub(crate) start_time: String,
    pub(crate) max_marks: i32,
    pub(crate) passing_marks: i32,
    pub(crate) teacher_id: Option<String>,
}

impl From<&ExamSubject> for GradableSubjectResponse {
    fn from(subject: &ExamSubject) -> Self {
        Self {
            id: subject.id.clone(),
            name: subject.name.clone(),
            exam_date: format_date(subject.exam_date),
            start_time: format_clock(subject.start_time),
            max_marks: subject.max_marks,
            passing_marks: subject.passing_marks,
            teacher_id: subject.teacher_id.clone(),
        }
    }
}
