use axum::body::to_bytes;
use axum::http::{header, Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::types::{ExamStatus, FeeStatus};
use crate::services::access::ActorRole;
use crate::services::admit_cards::verification_code;
use crate::test_support;

fn card_request(student_id: &str, examination_id: &str) -> serde_json::Value {
    json!({"student_id": student_id, "examination_id": examination_id})
}

#[tokio::test]
async fn cleared_student_downloads_admit_card() {
    let ctx = test_support::setup_test_context().await;
    ctx.seed_examination(&test_support::sample_examination(test_support::SCHOOL_ID)).await;
    ctx.store.insert_fee(test_support::fee("fee-1", "student-1", FeeStatus::Paid, 500.0, 500.0));
    let student = test_support::actor("student-1", ActorRole::Student);
    let token = ctx.token(&student);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/admit-cards/eligibility/student-1",
            Some(&token),
            None,
        ))
        .await
        .expect("eligibility");
    assert_eq!(response.status(), StatusCode::OK);
    let eligibility = test_support::read_json(response).await;
    assert_eq!(eligibility["eligible"], true);
    assert!(eligibility["banner"].is_null());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/admit-cards",
            Some(&token),
            Some(card_request("student-1", "exam-1")),
        ))
        .await
        .expect("admit card");
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    let content_type = headers[header::CONTENT_TYPE].to_str().expect("content type");
    assert!(content_type.starts_with("text/plain"));
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"admit-card-MID-8-student-1.txt\""
    );
    let code = verification_code(test_support::SCHOOL_ID, "exam-1", "student-1");
    assert_eq!(headers["x-verification-code"], code.as_str());

    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let text = String::from_utf8(body.to_vec()).expect("utf-8");
    assert!(text.starts_with("ADMIT CARD"), "{text}");
    assert!(text.contains("Mathematics"));
    assert!(text.contains(&code));
}

#[tokio::test]
async fn outstanding_fees_block_until_paid() {
    let ctx = test_support::setup_test_context().await;
    ctx.seed_examination(&test_support::sample_examination(test_support::SCHOOL_ID)).await;
    ctx.store.insert_fee(test_support::fee("fee-1", "student-1", FeeStatus::Pending, 1200.0, 0.0));
    ctx.store
        .insert_fee(test_support::fee("fee-2", "student-1", FeeStatus::Partial, 800.0, 500.0));
    let token = ctx.token(&test_support::actor("ctrl-1", ActorRole::ExamController));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/admit-cards/eligibility/student-1",
            Some(&token),
            None,
        ))
        .await
        .expect("eligibility");
    let eligibility = test_support::read_json(response).await;
    assert_eq!(eligibility["eligible"], false);
    assert_eq!(eligibility["pending_fee_count"], 1);
    assert_eq!(eligibility["partial_fee_count"], 1);
    assert!(eligibility["banner"].as_str().expect("banner").contains("1200.00"));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/admit-cards",
            Some(&token),
            Some(card_request("student-1", "exam-1")),
        ))
        .await
        .expect("blocked admit card");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = test_support::read_json(response).await;
    assert_eq!(body["fees"]["pending_amount"], 1200.0);
    assert_eq!(body["fees"]["eligible"], false);

    ctx.store.set_fee_status("fee-1", FeeStatus::Paid);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/admit-cards",
            Some(&token),
            Some(card_request("student-1", "exam-1")),
        ))
        .await
        .expect("admit card after payment");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn admit_card_requests_are_scoped() {
    let ctx = test_support::setup_test_context().await;
    ctx.seed_examination(&test_support::sample_examination(test_support::SCHOOL_ID)).await;
    let mut draft = test_support::examination_starting(
        test_support::SCHOOL_ID,
        "exam-draft",
        test_support::fixed_now().date(),
    );
    draft.status = ExamStatus::Draft;
    ctx.seed_examination(&draft).await;

    let student = test_support::actor("student-1", ActorRole::Student);
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/admit-cards",
            Some(&ctx.token(&student)),
            Some(card_request("student-2", "exam-1")),
        ))
        .await
        .expect("someone else's card");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = ctx.token(&test_support::actor("admin-1", ActorRole::Admin));
    let cases = [
        (card_request("student-1", "exam-draft"), StatusCode::CONFLICT),
        (card_request("student-3", "exam-1"), StatusCode::UNPROCESSABLE_ENTITY),
        (card_request("student-9", "exam-1"), StatusCode::NOT_FOUND),
        (card_request("student-1", "exam-404"), StatusCode::NOT_FOUND),
    ];
    for (payload, expected) in cases {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/admit-cards",
                Some(&admin),
                Some(payload.clone()),
            ))
            .await
            .expect("admit card");
        assert_eq!(response.status(), expected, "{payload}");
    }
}
