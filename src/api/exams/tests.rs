use axum::http::{Method, StatusCode};
use serde_json::json;
use time::{Date, Duration};
use tower::ServiceExt;

use crate::core::time::{format_date, primitive_now_utc};
use crate::db::types::ExamStatus;
use crate::services::access::ActorRole;
use crate::test_support;

fn upcoming(days: i64) -> Date {
    primitive_now_utc().date() + Duration::days(days)
}

fn exam_payload(start: Date) -> serde_json::Value {
    json!({
        "name": "Midterm Examination",
        "code": "MID-8",
        "exam_type": "midterm",
        "class_name": "Grade 8",
        "sections": ["A", "B"],
        "exam_start_date": format_date(start),
        "exam_end_date": format_date(start + Duration::days(4)),
        "subjects": [
            {
                "name": "Mathematics",
                "exam_date": format_date(start),
                "start_time": "09:00",
                "duration_minutes": 120,
                "room": "Hall A",
                "max_marks": 100,
                "total_marks": 100,
                "passing_marks": 40,
                "teacher_id": "teacher-a",
                "invigilators": [{"teacher_id": "teacher-c", "role": "chief"}]
            },
            {
                "name": "Science",
                "exam_date": format_date(start + Duration::days(1)),
                "start_time": "09:00",
                "duration_minutes": 120,
                "max_marks": 100,
                "total_marks": 100,
                "passing_marks": 35,
                "teacher_id": "teacher-b",
                "invigilators": [{"teacher_id": "teacher-c"}]
            }
        ]
    })
}

#[tokio::test]
async fn controller_creates_publishes_and_updates_exam() {
    let ctx = test_support::setup_test_context().await;
    let controller = test_support::actor("ctrl-1", ActorRole::ExamController);
    let token = ctx.token(&controller);
    let start = upcoming(30);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&token),
            Some(exam_payload(start)),
        ))
        .await
        .expect("create exam");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = test_support::read_json(response).await;
    let exam = &created["examination"];
    let exam_id = exam["id"].as_str().expect("exam id").to_string();
    assert_eq!(exam["status"], "draft");
    assert_eq!(exam["subjects"][0]["invigilators"][0]["name"], "Chen Li");
    assert_eq!(exam["subjects"][1]["invigilators"][0]["role"], "invigilator");
    assert_eq!(created["conflicts"].as_array().map(Vec::len), Some(0));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/exams/{exam_id}/status"),
            Some(&token),
            Some(json!({"status": "public"})),
        ))
        .await
        .expect("publish exam");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(test_support::read_json(response).await["status"], "public");

    let mut update = exam_payload(start);
    update["subjects"][0]["id"] = exam["subjects"][0]["id"].clone();
    update["subjects"][0]["room"] = json!("Hall C");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/exams/{exam_id}"),
            Some(&token),
            Some(update),
        ))
        .await
        .expect("update exam");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = test_support::read_json(response).await;
    assert_eq!(updated["examination"]["status"], "public");
    assert_eq!(updated["examination"]["subjects"][0]["id"], exam["subjects"][0]["id"]);
    assert_eq!(updated["examination"]["subjects"][0]["room"], "Hall C");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/exams/{exam_id}/status"),
            Some(&token),
            Some(json!({"status": "draft"})),
        ))
        .await
        .expect("unpublish exam");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(test_support::read_json(response).await["current_state"], "public");

    let student = test_support::actor("student-1", ActorRole::Student);
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/exams",
            Some(&ctx.token(&student)),
            None,
        ))
        .await
        .expect("list exams");
    assert_eq!(response.status(), StatusCode::OK);
    let listed = test_support::read_json(response).await;
    assert_eq!(listed["total_count"], 1);
    assert_eq!(listed["items"][0]["subject_count"], 2);
}

#[tokio::test]
async fn invalid_definition_reports_every_field() {
    let ctx = test_support::setup_test_context().await;
    let token = ctx.token(&test_support::actor("admin-1", ActorRole::Admin));
    let start = upcoming(30);

    let mut payload = exam_payload(start);
    payload["name"] = json!("ab");
    payload["class_name"] = json!("  ");
    payload["exam_end_date"] = json!(format_date(start - Duration::days(1)));
    payload["subjects"][0]["duration_minutes"] = json!(20);
    payload["subjects"][1]["passing_marks"] = json!(120);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams/validate",
            Some(&token),
            Some(payload.clone()),
        ))
        .await
        .expect("validate exam");
    assert_eq!(response.status(), StatusCode::OK);
    let report = test_support::read_json(response).await;
    assert_eq!(report["valid"], false);
    for field in [
        "name",
        "class_name",
        "exam_end_date",
        "subjects[0].duration_minutes",
        "subjects[1].passing_marks",
    ] {
        assert!(report["errors"].get(field).is_some(), "missing error for {field}: {report}");
    }

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&token),
            Some(payload),
        ))
        .await
        .expect("create exam");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = test_support::read_json(response).await;
    assert_eq!(
        body["errors"]["subjects[0].duration_minutes"][0],
        "duration must be 30-480 minutes"
    );

    let (items, total) =
        ctx.state.repos().exams.list(test_support::SCHOOL_ID, None, 0, 10).await.expect("list");
    assert!(items.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn unknown_invigilator_is_rejected() {
    let ctx = test_support::setup_test_context().await;
    let token = ctx.token(&test_support::actor("admin-1", ActorRole::Admin));

    let mut payload = exam_payload(upcoming(30));
    payload["subjects"][1]["invigilators"] = json!([{"teacher_id": "teacher-zz"}]);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&token),
            Some(payload),
        ))
        .await
        .expect("create exam");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = test_support::read_json(response).await;
    assert!(body["errors"].get("subjects[1].invigilators[0].teacher_id").is_some());
}

#[tokio::test]
async fn double_booked_invigilator_is_reported_but_not_blocking() {
    let ctx = test_support::setup_test_context().await;
    let token = ctx.token(&test_support::actor("ctrl-1", ActorRole::ExamController));
    let start = upcoming(45);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&token),
            Some(exam_payload(start)),
        ))
        .await
        .expect("create first exam");
    assert_eq!(response.status(), StatusCode::CREATED);

    let second = json!({
        "name": "Grade 9 Unit Test",
        "code": "UT-9",
        "exam_type": "unit",
        "class_name": "Grade 9",
        "sections": ["A"],
        "exam_start_date": format_date(start),
        "exam_end_date": format_date(start),
        "subjects": [{
            "name": "English",
            "exam_date": format_date(start),
            "start_time": "10:00",
            "duration_minutes": 90,
            "max_marks": 50,
            "total_marks": 50,
            "passing_marks": 20,
            "invigilators": [{"teacher_id": "teacher-c"}]
        }]
    });
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&token),
            Some(second),
        ))
        .await
        .expect("create second exam");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = test_support::read_json(response).await;
    let conflicts = created["conflicts"].as_array().expect("conflicts");
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["teacher_id"], "teacher-c");
    assert_eq!(conflicts[0]["conflicts_with"][0]["subject_name"], "Mathematics");
    assert_eq!(conflicts[0]["conflicts_with"][0]["end_time"], "11:00");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams/invigilator-conflicts",
            Some(&token),
            Some(json!({
                "teacher_id": "teacher-c",
                "exam_date": format_date(start),
                "start_time": "10:30",
                "duration_minutes": 30
            })),
        ))
        .await
        .expect("check conflicts");
    assert_eq!(response.status(), StatusCode::OK);
    let check = test_support::read_json(response).await;
    assert_eq!(check["conflict"], true);
    assert_eq!(check["conflicting_count"], 2);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams/invigilator-conflicts",
            Some(&token),
            Some(json!({
                "teacher_id": "teacher-c",
                "exam_date": format_date(start),
                "start_time": "11:30",
                "duration_minutes": 60
            })),
        ))
        .await
        .expect("check free slot");
    let check = test_support::read_json(response).await;
    assert_eq!(check["conflict"], false);
    assert_eq!(check["conflicting_count"], 0);
}

#[tokio::test]
async fn only_managers_author_and_students_see_published_exams() {
    let ctx = test_support::setup_test_context().await;
    let mut draft =
        test_support::examination_starting(test_support::SCHOOL_ID, "exam-d", upcoming(20));
    draft.status = ExamStatus::Draft;
    ctx.seed_examination(&draft).await;

    let teacher = test_support::actor("teacher-a", ActorRole::Teacher);
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&ctx.token(&teacher)),
            Some(exam_payload(upcoming(30))),
        ))
        .await
        .expect("teacher create");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let student = test_support::actor("student-1", ActorRole::Student);
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/exams/exam-d",
            Some(&ctx.token(&student)),
            None,
        ))
        .await
        .expect("student get draft");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/exams/exam-d/gradable-subjects",
            Some(&ctx.token(&teacher)),
            None,
        ))
        .await
        .expect("gradable subjects");
    assert_eq!(response.status(), StatusCode::OK);
    let subjects = test_support::read_json(response).await;
    assert_eq!(subjects.as_array().map(Vec::len), Some(1));
    assert_eq!(subjects[0]["name"], "Mathematics");
}

#[tokio::test]
async fn ended_exam_is_immutable_and_delete_cascades() {
    let ctx = test_support::setup_test_context().await;
    let token = ctx.token(&test_support::actor("admin-1", ActorRole::Admin));

    let past =
        test_support::examination_starting(test_support::SCHOOL_ID, "exam-old", upcoming(-10));
    ctx.seed_examination(&past).await;
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            "/api/v1/exams/exam-old/status",
            Some(&token),
            Some(json!({"status": "private"})),
        ))
        .await
        .expect("change ended exam");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(test_support::read_json(response).await["current_state"], "ended");

    let live =
        test_support::examination_starting(test_support::SCHOOL_ID, "exam-live", upcoming(5));
    ctx.seed_examination(&live).await;
    ctx.store.insert_result(test_support::result_record(
        test_support::SCHOOL_ID,
        "exam-live",
        "student-1",
    ));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            "/api/v1/exams/exam-live",
            Some(&token),
            None,
        ))
        .await
        .expect("delete exam");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/results/result-exam-live-student-1",
            Some(&token),
            None,
        ))
        .await
        .expect("get deleted result");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
