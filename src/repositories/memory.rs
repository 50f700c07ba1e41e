use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use time::{Date, PrimitiveDateTime};

use crate::db::models::{
    Examination, Fee, InvigilatedSession, ResultRecord, StudentProfile, TeacherProfile,
};
use crate::db::types::ExamStatus;
use crate::repositories::{
    Directory, ExamRepository, FeeLedger, ResultFilter, ResultMutation, ResultRepository,
    ResultTransition,
};
use crate::services::errors::{EngineError, StoreError};
use crate::services::result_workflow::WorkflowState;

#[derive(Default)]
struct MemoryState {
    exams: HashMap<String, Examination>,
    results: HashMap<String, ResultRecord>,
    fees: Vec<Fee>,
    students: HashMap<(String, String), StudentProfile>,
    teachers: HashMap<(String, String), TeacherProfile>,
}

/// Process-local backend. Every operation holds a single mutex, which also
/// serializes result merges.
#[derive(Default, Clone)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

fn page<T>(items: Vec<T>, skip: i64, limit: i64) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let skip = usize::try_from(skip.max(0)).unwrap_or(0);
    let limit = usize::try_from(limit.clamp(1, 1000)).unwrap_or(1);
    (items.into_iter().skip(skip).take(limit).collect(), total)
}

fn matches_filter(record: &ResultRecord, school_id: &str, filter: &ResultFilter<'_>) -> bool {
    record.school_id == school_id
        && filter.examination_id.map_or(true, |id| record.examination_id == id)
        && filter.student_id.map_or(true, |id| record.student_id == id)
        && filter.state.map_or(true, |state| WorkflowState::of(record) == state)
        && filter.examination_ids.map_or(true, |ids| ids.contains(&record.examination_id))
}

impl MemoryStore {
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    #[cfg(test)]
    pub(crate) fn insert_student(&self, student: StudentProfile) {
        if let Ok(mut state) = self.lock() {
            state.students.insert((student.school_id.clone(), student.id.clone()), student);
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_teacher(&self, teacher: TeacherProfile) {
        if let Ok(mut state) = self.lock() {
            state.teachers.insert((teacher.school_id.clone(), teacher.id.clone()), teacher);
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_fee(&self, fee: Fee) {
        if let Ok(mut state) = self.lock() {
            state.fees.push(fee);
        }
    }

    #[cfg(test)]
    pub(crate) fn set_fee_status(&self, fee_id: &str, status: crate::db::types::FeeStatus) {
        if let Ok(mut state) = self.lock() {
            for fee in state.fees.iter_mut().filter(|fee| fee.id == fee_id) {
                fee.status = status;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_result(&self, record: ResultRecord) {
        if let Ok(mut state) = self.lock() {
            state.results.insert(record.id.clone(), record);
        }
    }
}

#[async_trait]
impl ExamRepository for MemoryStore {
    async fn insert(&self, exam: &Examination) -> Result<(), StoreError> {
        self.lock()?.exams.insert(exam.id.clone(), exam.clone());
        Ok(())
    }

    async fn replace(&self, exam: &Examination) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if let Some(stored) = state.exams.get_mut(&exam.id) {
            if stored.school_id == exam.school_id {
                let status = stored.status;
                *stored = exam.clone();
                stored.status = status;
            }
        }
        Ok(())
    }

    async fn find(&self, school_id: &str, id: &str) -> Result<Option<Examination>, StoreError> {
        let state = self.lock()?;
        Ok(state.exams.get(id).filter(|exam| exam.school_id == school_id).cloned())
    }

    async fn list(
        &self,
        school_id: &str,
        status: Option<ExamStatus>,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Examination>, i64), StoreError> {
        let state = self.lock()?;
        let mut exams: Vec<Examination> = state
            .exams
            .values()
            .filter(|exam| exam.school_id == school_id)
            .filter(|exam| status.map_or(true, |status| exam.status == status))
            .cloned()
            .collect();
        exams.sort_by(|a, b| {
            b.exam_start_date
                .cmp(&a.exam_start_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(page(exams, skip, limit))
    }

    async fn list_for_school(&self, school_id: &str) -> Result<Vec<Examination>, StoreError> {
        let state = self.lock()?;
        let mut exams: Vec<Examination> =
            state.exams.values().filter(|exam| exam.school_id == school_id).cloned().collect();
        exams.sort_by(|a, b| b.exam_start_date.cmp(&a.exam_start_date));
        Ok(exams)
    }

    async fn update_status(
        &self,
        school_id: &str,
        id: &str,
        status: ExamStatus,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        match state.exams.get_mut(id).filter(|exam| exam.school_id == school_id) {
            Some(exam) => {
                exam.status = status;
                exam.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, school_id: &str, id: &str) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let owned = state.exams.get(id).is_some_and(|exam| exam.school_id == school_id);
        if !owned {
            return Ok(false);
        }
        state.exams.remove(id);
        state.results.retain(|_, record| record.examination_id != id);
        Ok(true)
    }

    async fn sessions_for_teacher(
        &self,
        school_id: &str,
        teacher_id: &str,
        date: Date,
    ) -> Result<Vec<InvigilatedSession>, StoreError> {
        let state = self.lock()?;
        let mut sessions: Vec<InvigilatedSession> = state
            .exams
            .values()
            .filter(|exam| exam.school_id == school_id)
            .flat_map(|exam| {
                exam.subjects
                    .iter()
                    .filter(|subject| subject.exam_date == date)
                    .filter(|subject| {
                        subject
                            .invigilators
                            .0
                            .iter()
                            .any(|slot| slot.teacher_id.as_deref() == Some(teacher_id))
                    })
                    .map(move |subject| InvigilatedSession {
                        examination_id: exam.id.clone(),
                        examination_name: exam.name.clone(),
                        subject_id: subject.id.clone(),
                        subject_name: subject.name.clone(),
                        teacher_id: teacher_id.to_string(),
                        exam_date: subject.exam_date,
                        start_time: subject.start_time,
                        duration_minutes: subject.duration_minutes,
                    })
            })
            .collect();
        sessions.sort_by_key(|session| session.start_time);
        Ok(sessions)
    }
}

#[async_trait]
impl ResultRepository for MemoryStore {
    async fn find(&self, school_id: &str, id: &str) -> Result<Option<ResultRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state.results.get(id).filter(|record| record.school_id == school_id).cloned())
    }

    async fn list(
        &self,
        school_id: &str,
        filter: ResultFilter<'_>,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<ResultRecord>, i64), StoreError> {
        let state = self.lock()?;
        let mut records: Vec<ResultRecord> = state
            .results
            .values()
            .filter(|record| matches_filter(record, school_id, &filter))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(page(records, skip, limit))
    }

    async fn upsert_locked(
        &self,
        school_id: &str,
        examination_id: &str,
        student_id: &str,
        mutation: ResultMutation,
    ) -> Result<ResultRecord, EngineError> {
        let mut state = self.lock()?;
        let existing = state
            .results
            .values()
            .find(|record| {
                record.school_id == school_id
                    && record.examination_id == examination_id
                    && record.student_id == student_id
            })
            .cloned();

        let record = mutation(existing)?;
        state.results.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_locked(
        &self,
        school_id: &str,
        id: &str,
        transition: ResultTransition,
    ) -> Result<ResultRecord, EngineError> {
        let mut state = self.lock()?;
        let Some(existing) =
            state.results.get(id).filter(|record| record.school_id == school_id).cloned()
        else {
            return Err(EngineError::NotFound("Result not found".to_string()));
        };

        let record = transition(existing)?;
        state.results.insert(record.id.clone(), record.clone());
        Ok(record)
    }
}

#[async_trait]
impl FeeLedger for MemoryStore {
    async fn fees_for_student(
        &self,
        school_id: &str,
        student_id: &str,
    ) -> Result<Vec<Fee>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .fees
            .iter()
            .filter(|fee| fee.school_id == school_id && fee.student_id == student_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn find_student(
        &self,
        school_id: &str,
        id: &str,
    ) -> Result<Option<StudentProfile>, StoreError> {
        let state = self.lock()?;
        Ok(state.students.get(&(school_id.to_string(), id.to_string())).cloned())
    }

    async fn find_teacher(
        &self,
        school_id: &str,
        id: &str,
    ) -> Result<Option<TeacherProfile>, StoreError> {
        let state = self.lock()?;
        Ok(state.teachers.get(&(school_id.to_string(), id.to_string())).cloned())
    }
}
