use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use sqlx::types::Json;
use time::macros::{date, datetime, time};
use time::{Date, Duration, PrimitiveDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{config::Settings, security, state::AppState};
use crate::db::models::{
    ExamSubject, Examination, Fee, InvigilatorAssignment, ResultRecord, StudentProfile,
    SubjectResult, TeacherProfile,
};
use crate::db::types::{ExamStatus, ExamType, FeeStatus, InvigilatorRole, PassStatus};
use crate::repositories::{memory::MemoryStore, Repositories};
use crate::services::access::{Actor, ActorRole};
use crate::services::template_renderer::PlainTextRenderer;

const TEST_SECRET_KEY: &str = "test-secret";
pub(crate) const SCHOOL_ID: &str = "school-1";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) store: MemoryStore,
    _guard: OwnedMutexGuard<()>,
}

impl TestContext {
    pub(crate) fn token(&self, actor: &Actor) -> String {
        bearer_token(actor, self.state.settings())
    }

    pub(crate) async fn seed_examination(&self, exam: &Examination) {
        self.state.repos().exams.insert(exam).await.expect("seed examination");
    }
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("EXAM_LEDGER_ENV", "test");
    std::env::set_var("EXAM_LEDGER_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("STORAGE_BACKEND", "memory");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("API_V1_STR");
    std::env::remove_var("PROJECT_NAME");
    std::env::remove_var("RENDERER_URL");
    std::env::remove_var("GRADE_BANDS");
    std::env::remove_var("ADMIT_CARD_BLOCK_ON_PARTIAL");
    std::env::remove_var("BACKEND_CORS_ORIGINS");
}

/// App wired to an in-memory store seeded with a small school directory.
pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let store = MemoryStore::default();
    seed_directory(&store);

    let state = AppState::new(
        settings,
        Repositories::memory(store.clone()),
        Arc::new(PlainTextRenderer),
    );
    let app = api::router::router(state.clone());

    TestContext { state, app, store, _guard: guard }
}

fn seed_directory(store: &MemoryStore) {
    store.insert_student(student(SCHOOL_ID, "student-1"));
    store.insert_student(StudentProfile {
        section: Some("B".to_string()),
        ..student(SCHOOL_ID, "student-2")
    });
    store.insert_student(StudentProfile {
        class_name: "Grade 9".to_string(),
        ..student(SCHOOL_ID, "student-3")
    });

    for (id, name) in
        [("teacher-a", "Asha Rao"), ("teacher-b", "Ben Okafor"), ("teacher-c", "Chen Li")]
    {
        store.insert_teacher(TeacherProfile {
            id: id.to_string(),
            school_id: SCHOOL_ID.to_string(),
            full_name: name.to_string(),
        });
    }
}

pub(crate) fn fixed_now() -> PrimitiveDateTime {
    datetime!(2026-10-19 10:00)
}

pub(crate) fn actor(id: &str, role: ActorRole) -> Actor {
    Actor {
        id: id.to_string(),
        school_id: SCHOOL_ID.to_string(),
        role,
        subjects: Vec::new(),
        name: None,
    }
}

pub(crate) fn student(school_id: &str, id: &str) -> StudentProfile {
    StudentProfile {
        id: id.to_string(),
        school_id: school_id.to_string(),
        full_name: format!("Student {id}"),
        roll_number: Some(format!("R-{id}")),
        class_name: "Grade 8".to_string(),
        section: Some("A".to_string()),
    }
}

pub(crate) fn fee(id: &str, student_id: &str, status: FeeStatus, amount: f64, paid: f64) -> Fee {
    Fee {
        id: id.to_string(),
        school_id: SCHOOL_ID.to_string(),
        student_id: student_id.to_string(),
        description: Some("Term fee".to_string()),
        amount,
        paid_amount: paid,
        status,
        due_date: Some(date!(2026 - 10 - 01)),
    }
}

fn subject(
    exam_id: &str,
    position: i32,
    name: &str,
    exam_date: Date,
    teacher_id: &str,
    passing_marks: i32,
) -> ExamSubject {
    ExamSubject {
        id: format!("{exam_id}-subject-{position}"),
        examination_id: exam_id.to_string(),
        position,
        name: name.to_string(),
        exam_date,
        start_time: time!(09:00),
        duration_minutes: 120,
        room: Some("Hall A".to_string()),
        max_marks: 100,
        total_marks: 100,
        passing_marks,
        teacher_id: Some(teacher_id.to_string()),
        invigilators: Json(vec![InvigilatorAssignment {
            teacher_id: Some(teacher_id.to_string()),
            name: format!("Invigilator {teacher_id}"),
            role: InvigilatorRole::Chief,
        }]),
    }
}

/// Grade 8 midterm: Mathematics (teacher-a) then Science (teacher-b), both out of 100.
pub(crate) fn sample_examination(school_id: &str) -> Examination {
    examination_starting(school_id, "exam-1", date!(2026 - 11 - 02))
}

pub(crate) fn examination_starting(school_id: &str, id: &str, start: Date) -> Examination {
    Examination {
        id: id.to_string(),
        school_id: school_id.to_string(),
        name: "Midterm Examination".to_string(),
        code: Some("MID-8".to_string()),
        exam_type: ExamType::Midterm,
        class_name: "Grade 8".to_string(),
        sections: vec!["A".to_string(), "B".to_string()],
        description: None,
        exam_start_date: start,
        exam_end_date: start + Duration::days(4),
        status: ExamStatus::Public,
        created_by: "admin-1".to_string(),
        created_at: fixed_now(),
        updated_at: fixed_now(),
        subjects: vec![
            subject(id, 0, "Mathematics", start, "teacher-a", 40),
            subject(id, 1, "Science", start + Duration::days(1), "teacher-b", 35),
        ],
    }
}

pub(crate) fn subject_result(
    name: &str,
    marks_obtained: f64,
    max_marks: f64,
    passing_marks: f64,
) -> SubjectResult {
    SubjectResult {
        subject_name: name.to_string(),
        marks_obtained,
        max_marks,
        passing_marks,
        grade: String::new(),
        status: if marks_obtained >= passing_marks { PassStatus::Pass } else { PassStatus::Fail },
        graded_by: None,
    }
}

pub(crate) fn result_record(
    school_id: &str,
    examination_id: &str,
    student_id: &str,
) -> ResultRecord {
    ResultRecord {
        id: format!("result-{examination_id}-{student_id}"),
        school_id: school_id.to_string(),
        examination_id: examination_id.to_string(),
        student_id: student_id.to_string(),
        subject_results: Json(Vec::new()),
        remarks: None,
        is_draft: true,
        approval_status: None,
        rejection_reason: None,
        total_marks_obtained: 0.0,
        total_max_marks: 0.0,
        overall_percentage: 0.0,
        overall_grade: "F".to_string(),
        overall_status: PassStatus::Fail,
        submitted_by: "teacher-a".to_string(),
        reviewed_by: None,
        reviewed_at: None,
        reopened_by: None,
        reopened_at: None,
        reopen_reason: None,
        created_at: fixed_now(),
        updated_at: fixed_now(),
    }
}

pub(crate) fn bearer_token(actor: &Actor, settings: &Settings) -> String {
    security::create_access_token(actor, settings, None).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
