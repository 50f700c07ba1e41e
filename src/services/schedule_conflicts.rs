use std::collections::HashMap;

use serde::Serialize;
use time::{Date, Duration, PrimitiveDateTime, Time};

use crate::core::time::{serde_clock, serde_date};
use crate::db::models::InvigilatedSession;

/// Half-open `[start, end)` slot of a subject session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimeInterval {
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
}

impl TimeInterval {
    pub(crate) fn from_slot(date: Date, start_time: Time, duration_minutes: i32) -> Self {
        let start = PrimitiveDateTime::new(date, start_time);
        let end = start + Duration::minutes(i64::from(duration_minutes.max(0)));
        Self { start, end }
    }

    pub(crate) fn start(&self) -> PrimitiveDateTime {
        self.start
    }

    pub(crate) fn end(&self) -> PrimitiveDateTime {
        self.end
    }

    /// Touching endpoints do not overlap.
    pub(crate) fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug)]
struct IndexedSession {
    session: InvigilatedSession,
    interval: TimeInterval,
}

/// Sessions grouped by (teacher, exam date) for overlap lookups.
#[derive(Debug, Default)]
pub(crate) struct ConflictIndex {
    by_slot: HashMap<(String, Date), Vec<IndexedSession>>,
}

impl ConflictIndex {
    pub(crate) fn build(sessions: impl IntoIterator<Item = InvigilatedSession>) -> Self {
        let mut index = Self::default();
        for session in sessions {
            index.insert(session);
        }
        index
    }

    pub(crate) fn insert(&mut self, session: InvigilatedSession) {
        let interval = TimeInterval::from_slot(
            session.exam_date,
            session.start_time,
            session.duration_minutes,
        );
        self.by_slot
            .entry((session.teacher_id.clone(), session.exam_date))
            .or_default()
            .push(IndexedSession { session, interval });
    }

    pub(crate) fn overlapping(
        &self,
        teacher_id: &str,
        date: Date,
        interval: &TimeInterval,
        exclude_subject_id: Option<&str>,
    ) -> Vec<&InvigilatedSession> {
        let Some(sessions) = self.by_slot.get(&(teacher_id.to_string(), date)) else {
            return Vec::new();
        };

        sessions
            .iter()
            .filter(|indexed| Some(indexed.session.subject_id.as_str()) != exclude_subject_id)
            .filter(|indexed| indexed.interval.overlaps(interval))
            .map(|indexed| &indexed.session)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ConflictQuery<'a> {
    pub(crate) teacher_id: &'a str,
    pub(crate) date: Date,
    pub(crate) start_time: Time,
    pub(crate) duration_minutes: i32,
    pub(crate) exclude_subject_id: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct ConflictingSession {
    pub(crate) examination_id: String,
    pub(crate) examination_name: String,
    pub(crate) subject_id: String,
    pub(crate) subject_name: String,
    #[serde(with = "serde_date")]
    pub(crate) exam_date: Date,
    #[serde(with = "serde_clock")]
    pub(crate) start_time: Time,
    #[serde(with = "serde_clock")]
    pub(crate) end_time: Time,
}

impl From<&InvigilatedSession> for ConflictingSession {
    fn from(session: &InvigilatedSession) -> Self {
        let interval = TimeInterval::from_slot(
            session.exam_date,
            session.start_time,
            session.duration_minutes,
        );
        Self {
            examination_id: session.examination_id.clone(),
            examination_name: session.examination_name.clone(),
            subject_id: session.subject_id.clone(),
            subject_name: session.subject_name.clone(),
            exam_date: session.exam_date,
            start_time: session.start_time,
            end_time: interval.end().time(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ConflictCheck {
    pub(crate) conflict: bool,
    pub(crate) conflicting_count: usize,
    pub(crate) conflicting_sessions: Vec<ConflictingSession>,
}

pub(crate) fn has_conflict(index: &ConflictIndex, query: &ConflictQuery<'_>) -> ConflictCheck {
    let candidate = TimeInterval::from_slot(query.date, query.start_time, query.duration_minutes);
    let conflicting: Vec<ConflictingSession> = index
        .overlapping(query.teacher_id, query.date, &candidate, query.exclude_subject_id)
        .into_iter()
        .map(ConflictingSession::from)
        .collect();

    ConflictCheck {
        conflict: !conflicting.is_empty(),
        conflicting_count: conflicting.len(),
        conflicting_sessions: conflicting,
    }
}

/// Advisory raised for one invigilator slot of an examination being authored.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct InvigilatorConflict {
    pub(crate) teacher_id: String,
    pub(crate) subject_id: String,
    pub(crate) subject_name: String,
    #[serde(with = "serde_date")]
    pub(crate) exam_date: Date,
    #[serde(with = "serde_clock")]
    pub(crate) start_time: Time,
    pub(crate) conflicting_count: usize,
    pub(crate) conflicts_with: Vec<ConflictingSession>,
}

/// Checks each candidate slot against `existing` sessions and against the
/// other candidates, since subjects of one draft can double-book a teacher too.
pub(crate) fn conflicts_for_candidates(
    candidates: &[InvigilatedSession],
    existing: Vec<InvigilatedSession>,
) -> Vec<InvigilatorConflict> {
    let index = ConflictIndex::build(existing.into_iter().chain(candidates.iter().cloned()));

    candidates
        .iter()
        .filter_map(|candidate| {
            let check = has_conflict(
                &index,
                &ConflictQuery {
                    teacher_id: &candidate.teacher_id,
                    date: candidate.exam_date,
                    start_time: candidate.start_time,
                    duration_minutes: candidate.duration_minutes,
                    exclude_subject_id: Some(&candidate.subject_id),
                },
            );
            check.conflict.then(|| InvigilatorConflict {
                teacher_id: candidate.teacher_id.clone(),
                subject_id: candidate.subject_id.clone(),
                subject_name: candidate.subject_name.clone(),
                exam_date: candidate.exam_date,
                start_time: candidate.start_time,
                conflicting_count: check.conflicting_count,
                conflicts_with: check.conflicting_sessions,
            })
        })
        .collect()
}
