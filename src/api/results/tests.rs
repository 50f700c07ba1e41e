use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::models::ResultRecord;
use crate::db::types::{ApprovalStatus, PassStatus};
use crate::schemas::result::SubmitResultRequest;
use crate::services::access::{Actor, ActorRole};
use crate::services::result_submission;
use crate::test_support::{self, TestContext};

async fn call(
    ctx: &TestContext,
    actor: &Actor,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(method, uri, Some(&ctx.token(actor)), body))
        .await
        .expect("response");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

fn marks(student_id: &str, subject: &str, obtained: f64, is_draft: bool) -> serde_json::Value {
    json!({
        "examination_id": "exam-1",
        "student_id": student_id,
        "subject_results": [{"subject_name": subject, "marks_obtained": obtained}],
        "is_draft": is_draft
    })
}

fn seeded_result(id: &str, student_id: &str, approval: ApprovalStatus) -> ResultRecord {
    ResultRecord {
        id: id.to_string(),
        is_draft: false,
        approval_status: Some(approval),
        ..test_support::result_record(test_support::SCHOOL_ID, "exam-1", student_id)
    }
}

#[tokio::test]
async fn two_teachers_submit_and_controller_approves() {
    let ctx = test_support::setup_test_context().await;
    ctx.seed_examination(&test_support::sample_examination(test_support::SCHOOL_ID)).await;
    let teacher_a = test_support::actor("teacher-a", ActorRole::Teacher);
    let teacher_b = test_support::actor("teacher-b", ActorRole::Teacher);
    let controller = test_support::actor("ctrl-1", ActorRole::ExamController);
    let owner = test_support::actor("student-1", ActorRole::Student);

    let (status, body) = call(
        &ctx,
        &teacher_a,
        Method::POST,
        "/api/v1/results",
        Some(marks("student-1", "Mathematics", 72.0, false)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["state"], "pending");
    let result_id = body["id"].as_str().expect("result id").to_string();

    let (status, body) = call(
        &ctx,
        &teacher_b,
        Method::POST,
        "/api/v1/results",
        Some(marks("student-1", "science", 50.0, false)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["id"], result_id.as_str());
    assert_eq!(body["complete_view"], false);
    assert_eq!(body["subject_results"].as_array().map(Vec::len), Some(1));
    assert!(body["total_marks_obtained"].is_null());

    let (status, body) =
        call(&ctx, &owner, Method::GET, &format!("/api/v1/results/{result_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "pending results stay hidden: {body}");

    let (status, body) =
        call(&ctx, &controller, Method::GET, &format!("/api/v1/results/{result_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_marks_obtained"], 122.0);
    assert_eq!(body["total_max_marks"], 200.0);
    assert_eq!(body["overall_percentage"], 61.0);
    assert_eq!(body["overall_grade"], "B");
    assert_eq!(body["overall_status"], "pass");
    assert_eq!(body["subject_results"][0]["subject_name"], "Mathematics");
    assert_eq!(body["subject_results"][1]["subject_name"], "Science");

    let approve_uri = format!("/api/v1/results/{result_id}/approve");
    let (status, body) = call(&ctx, &controller, Method::POST, &approve_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "approved");
    assert_eq!(body["reviewed_by"], "ctrl-1");

    let (status, body) = call(&ctx, &controller, Method::POST, &approve_uri, None).await;
    assert_eq!(status, StatusCode::OK, "approving twice is a no-op");
    assert_eq!(body["state"], "approved");

    let (status, body) = call(
        &ctx,
        &teacher_a,
        Method::POST,
        "/api/v1/results",
        Some(marks("student-1", "Mathematics", 80.0, false)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["current_state"], "approved");

    let (status, body) = call(&ctx, &owner, Method::GET, "/api/v1/results", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["items"][0]["overall_grade"], "B");

    let other = test_support::actor("student-2", ActorRole::Student);
    let (status, _) =
        call(&ctx, &other, Method::GET, &format!("/api/v1/results/{result_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_subject_submissions_are_both_kept() {
    let ctx = test_support::setup_test_context().await;
    ctx.seed_examination(&test_support::sample_examination(test_support::SCHOOL_ID)).await;
    let teacher_a = test_support::actor("teacher-a", ActorRole::Teacher);
    let teacher_b = test_support::actor("teacher-b", ActorRole::Teacher);
    let request = |subject: &str, obtained: f64| -> SubmitResultRequest {
        serde_json::from_value(marks("student-1", subject, obtained, false)).expect("request")
    };
    let now = test_support::fixed_now();

    let (maths, science) = tokio::join!(
        result_submission::submit_result(&ctx.state, &teacher_a, request("Mathematics", 72.0), now),
        result_submission::submit_result(&ctx.state, &teacher_b, request("Science", 50.0), now),
    );
    let maths = maths.expect("mathematics submission");
    let science = science.expect("science submission");
    assert_eq!(maths.id, science.id);

    let stored = ctx
        .state
        .repos()
        .results
        .find(test_support::SCHOOL_ID, &maths.id)
        .await
        .expect("lookup")
        .expect("stored result");
    let mut subjects: Vec<&str> =
        stored.subject_results.0.iter().map(|entry| entry.subject_name.as_str()).collect();
    subjects.sort_unstable();
    assert_eq!(subjects, ["Mathematics", "Science"]);
    assert_eq!(stored.total_marks_obtained, 122.0);
    assert_eq!(stored.total_max_marks, 200.0);
    assert_eq!(stored.overall_percentage, 61.0);
    assert_eq!(stored.overall_grade, "B");
    assert_eq!(stored.overall_status, PassStatus::Pass);
}

#[tokio::test]
async fn rejection_needs_reason_and_resubmission_returns_to_pending() {
    let ctx = test_support::setup_test_context().await;
    ctx.seed_examination(&test_support::sample_examination(test_support::SCHOOL_ID)).await;
    let teacher = test_support::actor("teacher-a", ActorRole::Teacher);
    let controller = test_support::actor("ctrl-1", ActorRole::ExamController);

    let (_, body) = call(
        &ctx,
        &teacher,
        Method::POST,
        "/api/v1/results",
        Some(marks("student-2", "Mathematics", 35.0, false)),
    )
    .await;
    let result_id = body["id"].as_str().expect("result id").to_string();
    let reject_uri = format!("/api/v1/results/{result_id}/reject");

    let (status, body) =
        call(&ctx, &controller, Method::POST, &reject_uri, Some(json!({"reason": "  "}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["reason"][0], "reason is required");

    let (status, body) = call(
        &ctx,
        &controller,
        Method::POST,
        &reject_uri,
        Some(json!({"reason": "Mathematics marks look transposed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "rejected");
    assert_eq!(body["rejection_reason"], "Mathematics marks look transposed");

    let (status, body) = call(
        &ctx,
        &teacher,
        Method::POST,
        "/api/v1/results",
        Some(marks("student-2", "Mathematics", 53.0, true)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "draft");

    let (status, body) = call(
        &ctx,
        &teacher,
        Method::POST,
        "/api/v1/results",
        Some(marks("student-2", "Mathematics", 53.0, false)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "pending");
    assert!(body["rejection_reason"].is_null());

    let (status, body) = call(
        &ctx,
        &teacher,
        Method::POST,
        &format!("/api/v1/results/{result_id}/approve"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
}

#[tokio::test]
async fn bulk_approve_reports_each_result() {
    let ctx = test_support::setup_test_context().await;
    ctx.seed_examination(&test_support::sample_examination(test_support::SCHOOL_ID)).await;
    ctx.store.insert_result(seeded_result("r-pending", "student-1", ApprovalStatus::Pending));
    ctx.store.insert_result(seeded_result("r-rejected", "student-2", ApprovalStatus::Rejected));
    let controller = test_support::actor("ctrl-1", ActorRole::ExamController);

    let (status, body) = call(
        &ctx,
        &controller,
        Method::POST,
        "/api/v1/results/bulk-approve",
        Some(json!({"result_ids": ["r-pending", "r-rejected", "r-missing", "r-pending"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 3);
    assert_eq!(body["succeeded"], 1);
    assert_eq!(body["failed"], 2);

    let outcomes = body["outcomes"].as_array().expect("outcomes");
    assert_eq!(outcomes[0]["result_id"], "r-pending");
    assert_eq!(outcomes[0]["ok"], true);
    assert_eq!(outcomes[0]["state"], "approved");
    assert_eq!(outcomes[1]["ok"], false);
    assert_eq!(outcomes[1]["error"]["kind"], "state_error");
    assert_eq!(outcomes[1]["error"]["current"], "rejected");
    assert_eq!(outcomes[2]["error"]["kind"], "not_found");

    let (status, body) = call(
        &ctx,
        &controller,
        Method::POST,
        "/api/v1/results/bulk-reject",
        Some(json!({"result_ids": ["r-pending"]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"].get("reason").is_some());

    let teacher = test_support::actor("teacher-a", ActorRole::Teacher);
    let (status, _) = call(
        &ctx,
        &teacher,
        Method::POST,
        "/api/v1/results/bulk-approve",
        Some(json!({"result_ids": ["r-pending"]})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_admins_reopen_approved_results() {
    let ctx = test_support::setup_test_context().await;
    ctx.seed_examination(&test_support::sample_examination(test_support::SCHOOL_ID)).await;
    ctx.store.insert_result(seeded_result("r-final", "student-1", ApprovalStatus::Approved));
    let controller = test_support::actor("ctrl-1", ActorRole::ExamController);
    let admin = test_support::actor("admin-1", ActorRole::Admin);
    let uri = "/api/v1/results/r-final/reopen";

    let (status, _) =
        call(&ctx, &controller, Method::POST, uri, Some(json!({"reason": "typo"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&ctx, &admin, Method::POST, uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = call(
        &ctx,
        &admin,
        Method::POST,
        uri,
        Some(json!({"reason": "Science paper re-evaluated"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "draft");
    assert_eq!(body["reopened_by"], "admin-1");
    assert_eq!(body["reopen_reason"], "Science paper re-evaluated");

    let (status, body) =
        call(&ctx, &admin, Method::POST, uri, Some(json!({"reason": "again"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["current_state"], "draft");
}

#[tokio::test]
async fn submissions_are_checked_before_anything_is_stored() {
    let ctx = test_support::setup_test_context().await;
    ctx.seed_examination(&test_support::sample_examination(test_support::SCHOOL_ID)).await;
    let teacher = test_support::actor("teacher-a", ActorRole::Teacher);
    let controller = test_support::actor("ctrl-1", ActorRole::ExamController);

    let (status, _) = call(
        &ctx,
        &teacher,
        Method::POST,
        "/api/v1/results",
        Some(marks("student-1", "Science", 40.0, false)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let student = test_support::actor("student-1", ActorRole::Student);
    let (status, _) = call(
        &ctx,
        &student,
        Method::POST,
        "/api/v1/results",
        Some(marks("student-1", "Mathematics", 99.0, false)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &ctx,
        &controller,
        Method::POST,
        "/api/v1/results",
        Some(marks("student-3", "Mathematics", 60.0, false)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"].get("student_id").is_some());

    let (status, body) = call(
        &ctx,
        &controller,
        Method::POST,
        "/api/v1/results",
        Some(marks("student-1", "Mathematics", 101.0, false)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["current_state"], "new");

    let (status, body) = call(
        &ctx,
        &controller,
        Method::POST,
        "/api/v1/results",
        Some(marks("student-1", "History", 60.0, false)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"].get("subject_results[0].subject_name").is_some());

    let (status, body) = call(&ctx, &controller, Method::GET, "/api/v1/results", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 0);
}

#[tokio::test]
async fn teacher_listing_counts_only_taught_examinations() {
    let ctx = test_support::setup_test_context().await;
    ctx.seed_examination(&test_support::sample_examination(test_support::SCHOOL_ID)).await;
    let mut other = test_support::examination_starting(
        test_support::SCHOOL_ID,
        "exam-2",
        test_support::fixed_now().date(),
    );
    for subject in &mut other.subjects {
        subject.teacher_id = Some("teacher-b".to_string());
    }
    ctx.seed_examination(&other).await;

    let seeded = [("exam-1", "student-1"), ("exam-2", "student-1"), ("exam-2", "student-2")];
    for (exam, student) in seeded {
        let record = test_support::result_record(test_support::SCHOOL_ID, exam, student);
        ctx.store.insert_result(record);
    }

    let teacher_a = test_support::actor("teacher-a", ActorRole::Teacher);
    let (status, body) = call(&ctx, &teacher_a, Method::GET, "/api/v1/results", None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["items"][0]["examination_id"], "exam-1");

    let teacher_b = test_support::actor("teacher-b", ActorRole::Teacher);
    let (_, body) = call(&ctx, &teacher_b, Method::GET, "/api/v1/results", None).await;
    assert_eq!(body["total_count"], 3);

    let teacher_c = test_support::actor("teacher-c", ActorRole::Teacher);
    let (_, body) = call(&ctx, &teacher_c, Method::GET, "/api/v1/results", None).await;
    assert_eq!(body["total_count"], 0);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
}
