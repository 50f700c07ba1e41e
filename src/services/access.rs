use serde::{Deserialize, Serialize};

use crate::db::models::{ExamSubject, Examination, SubjectResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ActorRole {
    Admin,
    ExamController,
    Teacher,
    Student,
}

/// The authenticated caller, scoped to one school.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Actor {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) role: ActorRole,
    pub(crate) subjects: Vec<String>,
    pub(crate) name: Option<String>,
}

impl Actor {
    pub(crate) fn is_staff(&self) -> bool {
        !matches!(self.role, ActorRole::Student)
    }

    pub(crate) fn can_manage_examinations(&self) -> bool {
        matches!(self.role, ActorRole::Admin | ActorRole::ExamController)
    }

    pub(crate) fn can_approve_results(&self) -> bool {
        matches!(self.role, ActorRole::Admin | ActorRole::ExamController)
    }

    pub(crate) fn can_reopen_results(&self) -> bool {
        matches!(self.role, ActorRole::Admin)
    }

    pub(crate) fn can_grade(&self) -> bool {
        matches!(self.role, ActorRole::Admin | ActorRole::ExamController | ActorRole::Teacher)
    }

    pub(crate) fn grades_all_subjects(&self) -> bool {
        matches!(self.role, ActorRole::Admin | ActorRole::ExamController)
    }

    pub(crate) fn can_act_for_student(&self, student_id: &str) -> bool {
        self.is_staff() || self.id == student_id
    }

    pub(crate) fn teaches(&self, subject: &ExamSubject) -> bool {
        if subject.teacher_id.as_deref() == Some(self.id.as_str()) {
            return true;
        }
        let name = subject.name.trim();
        self.subjects.iter().any(|taught| taught.trim().eq_ignore_ascii_case(name))
    }

    pub(crate) fn may_grade(&self, subject: &ExamSubject) -> bool {
        self.grades_all_subjects() || (self.can_grade() && self.teaches(subject))
    }
}

/// Subjects of `examination` the actor may grade or inspect marks for.
pub(crate) fn visible_subjects<'a>(
    actor: &Actor,
    examination: &'a Examination,
) -> Vec<&'a ExamSubject> {
    match actor.role {
        ActorRole::Admin | ActorRole::ExamController | ActorRole::Student => {
            examination.subjects.iter().collect()
        }
        ActorRole::Teacher => {
            examination.subjects.iter().filter(|subject| actor.teaches(subject)).collect()
        }
    }
}

/// Projects stored subject entries onto what the actor may see. The flag is
/// `true` when nothing was hidden.
pub(crate) fn project_subject_results(
    actor: &Actor,
    examination: &Examination,
    entries: &[SubjectResult],
) -> (Vec<SubjectResult>, bool) {
    let visible = visible_subjects(actor, examination);
    let projected: Vec<SubjectResult> = entries
        .iter()
        .filter(|entry| {
            visible.iter().any(|subject| {
                subject.name.trim().eq_ignore_ascii_case(entry.subject_name.trim())
            })
        })
        .cloned()
        .collect();
    let complete = projected.len() == entries.len();
    (projected, complete)
}
