use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::{Date, PrimitiveDateTime, Time};

use crate::db::types::{
    ApprovalStatus, ExamStatus, ExamType, FeeStatus, InvigilatorRole, PassStatus,
};

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Examination {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) name: String,
    pub(crate) code: Option<String>,
    pub(crate) exam_type: ExamType,
    pub(crate) class_name: String,
    pub(crate) sections: Vec<String>,
    pub(crate) description: Option<String>,
    pub(crate) exam_start_date: Date,
    pub(crate) exam_end_date: Date,
    pub(crate) status: ExamStatus,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    #[sqlx(skip)]
    pub(crate) subjects: Vec<ExamSubject>,
}

impl Examination {
    /// Definitions stay editable through the last exam day.
    pub(crate) fn is_mutable_on(&self, today: Date) -> bool {
        today <= self.exam_end_date
    }

    pub(crate) fn find_subject(&self, name: &str) -> Option<&ExamSubject> {
        let wanted = subject_key(name);
        self.subjects.iter().find(|subject| subject_key(&subject.name) == wanted)
    }
}

/// Subject names identify marks within an examination, compared trimmed and
/// case-insensitively.
pub(crate) fn subject_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ExamSubject {
    pub(crate) id: String,
    pub(crate) examination_id: String,
    pub(crate) position: i32,
    pub(crate) name: String,
    pub(crate) exam_date: Date,
    pub(crate) start_time: Time,
    pub(crate) duration_minutes: i32,
    pub(crate) room: Option<String>,
    pub(crate) max_marks: i32,
    pub(crate) total_marks: i32,
    pub(crate) passing_marks: i32,
    pub(crate) teacher_id: Option<String>,
    pub(crate) invigilators: Json<Vec<InvigilatorAssignment>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct InvigilatorAssignment {
    #[serde(default)]
    pub(crate) teacher_id: Option<String>,
    pub(crate) name: String,
    pub(crate) role: InvigilatorRole,
}

/// One invigilated slot, flattened out of an examination for conflict scans.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct InvigilatedSession {
    pub(crate) examination_id: String,
    pub(crate) examination_name: String,
    pub(crate) subject_id: String,
    pub(crate) subject_name: String,
    pub(crate) teacher_id: String,
    pub(crate) exam_date: Date,
    pub(crate) start_time: Time,
    pub(crate) duration_minutes: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SubjectResult {
    pub(crate) subject_name: String,
    pub(crate) marks_obtained: f64,
    pub(crate) max_marks: f64,
    pub(crate) passing_marks: f64,
    pub(crate) grade: String,
    pub(crate) status: PassStatus,
    #[serde(default)]
    pub(crate) graded_by: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ResultRecord {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) examination_id: String,
    pub(crate) student_id: String,
    pub(crate) subject_results: Json<Vec<SubjectResult>>,
    pub(crate) remarks: Option<String>,
    pub(crate) is_draft: bool,
    pub(crate) approval_status: Option<ApprovalStatus>,
    pub(crate) rejection_reason: Option<String>,
    pub(crate) total_marks_obtained: f64,
    pub(crate) total_max_marks: f64,
    pub(crate) overall_percentage: f64,
    pub(crate) overall_grade: String,
    pub(crate) overall_status: PassStatus,
    pub(crate) submitted_by: String,
    pub(crate) reviewed_by: Option<String>,
    pub(crate) reviewed_at: Option<PrimitiveDateTime>,
    pub(crate) reopened_by: Option<String>,
    pub(crate) reopened_at: Option<PrimitiveDateTime>,
    pub(crate) reopen_reason: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Fee {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) student_id: String,
    pub(crate) description: Option<String>,
    pub(crate) amount: f64,
    pub(crate) paid_amount: f64,
    pub(crate) status: FeeStatus,
    pub(crate) due_date: Option<Date>,
}

impl Fee {
    pub(crate) fn outstanding(&self) -> f64 {
        (self.amount - self.paid_amount).max(0.0)
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct StudentProfile {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) full_name: String,
    pub(crate) roll_number: Option<String>,
    pub(crate) class_name: String,
    pub(crate) section: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct TeacherProfile {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) full_name: String,
}
