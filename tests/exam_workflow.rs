// tests/exam_workflow.rs
//
// End-to-end workflows over the real router and the in-memory store:
// registry CRUD, enrollment lifecycle, grading and revaluation.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;

#[tokio::test]
async fn create_exam_returns_scheduled_record() {
    let app = spawn_app();
    let (status, body) = request(&app, "POST", "/api/exams", Some(exam_payload())).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["status"], "scheduled");
    assert_eq!(body["data"]["college_id"], 1);
    assert_eq!(body["data"]["question_paper_set_count"], 2);
}

#[tokio::test]
async fn create_exam_rejects_inverted_time_range() {
    let app = spawn_app();
    let mut payload = exam_payload();
    payload["end_time"] = json!("2025-07-01T08:00:00Z");

    let (status, body) = request(&app, "POST", "/api/exams", Some(payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn create_exam_rejects_passing_above_total() {
    let app = spawn_app();
    let mut payload = exam_payload();
    payload["passing_marks"] = json!(150);

    let (status, _) = request(&app, "POST", "/api/exams", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_exam_requires_known_course() {
    let app = spawn_app();
    let mut payload = exam_payload();
    payload["course_id"] = json!(9999);

    let (status, _) = request(&app, "POST", "/api/exams", Some(payload)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_college_header_is_unauthorized() {
    let app = spawn_app();
    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        axum::http::Request::get("/api/exams")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn exams_are_invisible_across_tenants() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;

    let (status, _) = request_as(
        &app,
        OTHER_COLLEGE,
        OPERATOR,
        "GET",
        &format!("/api/exams/{}", exam_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_exams_filters_by_status() {
    let app = spawn_app();
    let first = create_exam(&app).await;
    let second = create_exam(&app).await;
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/exams/{}/status", second),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(&app, "GET", "/api/exams?status=scheduled", None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"].as_i64().unwrap(), first);
}

#[tokio::test]
async fn exam_status_machine_rejects_skips_and_backward_moves() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;

    // scheduled -> completed skips ongoing
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/exams/{}/status", exam_id),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // forward flow works
    for next in ["ongoing", "completed"] {
        let (status, _) = request(
            &app,
            "PUT",
            &format!("/api/exams/{}/status", exam_id),
            Some(json!({ "status": next })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // completed is terminal
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/exams/{}/status", exam_id),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn enroll_is_idempotent_per_student() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/exams/{}/enroll", exam_id),
        Some(json!({ "student_id": 101 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["outcome"], "enrolled");

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/exams/{}/enroll", exam_id),
        Some(json!({ "student_id": 101 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "already_enrolled");

    assert_eq!(list_enrollments(&app, exam_id).await.len(), 1);
}

#[tokio::test]
async fn cancelled_enrollment_reactivates_on_re_enroll() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    enroll(&app, exam_id, 101).await;
    let enrollment_id = list_enrollments(&app, exam_id).await[0]["id"]
        .as_i64()
        .unwrap();

    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/enrollments/{}", enrollment_id),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/exams/{}/enroll", exam_id),
        Some(json!({ "student_id": 101 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["outcome"], "reactivated");
    assert_eq!(body["data"]["enrollment"]["status"], "enrolled");
}

#[tokio::test]
async fn enrollment_closes_once_exam_is_ongoing() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/exams/{}/status", exam_id),
        Some(json!({ "status": "ongoing" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/exams/{}/enroll", exam_id),
        Some(json!({ "student_id": 101 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn bulk_enroll_reports_per_student_outcomes() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    enroll(&app, exam_id, 101).await;

    // 101 is already enrolled, 9999 is unknown, 102 is fresh.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/exams/{}/enroll-bulk", exam_id),
        Some(json!({ "student_ids": [101, 9999, 102] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let outcomes = body["data"]["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0]["outcome"], "already_enrolled");
    assert_eq!(outcomes[1]["outcome"], "failed");
    assert!(outcomes[1]["detail"].as_str().is_some());
    assert_eq!(outcomes[2]["outcome"], "enrolled");

    // The failure did not abort the batch.
    assert_eq!(list_enrollments(&app, exam_id).await.len(), 2);
}

#[tokio::test]
async fn direct_seated_transition_is_reserved_to_the_allocator() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    enroll(&app, exam_id, 101).await;
    let enrollment_id = list_enrollments(&app, exam_id).await[0]["id"]
        .as_i64()
        .unwrap();

    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/enrollments/{}", enrollment_id),
        Some(json!({ "status": "seated" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancelling_an_exam_cascades_and_frees_the_room() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    let room_id = create_room(&app, "Hall A", 30).await;
    for student in [101, 102, 103] {
        enroll(&app, exam_id, student).await;
    }
    let (status, _) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/exams/{}/status", exam_id),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for enrollment in list_enrollments(&app, exam_id).await {
        assert_eq!(enrollment["status"], "cancelled");
    }

    // The booking is gone: the room is available in the same interval.
    let (status, body) = request(
        &app,
        "GET",
        &format!(
            "/api/exam-rooms/{}/availability?start_time=2025-07-01T09:00:00Z&end_time=2025-07-01T12:00:00Z",
            room_id
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available"], true);

    // Every enrolled student was notified.
    assert_eq!(app.notifier.sent().len(), 3);
}

#[tokio::test]
async fn deleting_an_exam_with_seated_students_conflicts() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    create_room(&app, "Hall A", 10).await;
    enroll(&app, exam_id, 101).await;
    let (status, _) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(&app, "DELETE", &format!("/api/exams/{}", exam_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Before allocation the same exam deletes cleanly.
    let other = create_exam(&app).await;
    enroll(&app, other, 102).await;
    let (status, _) = request(&app, "DELETE", &format!("/api/exams/{}", other), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn schedule_edits_conflict_while_students_are_seated() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    create_room(&app, "Hall A", 10).await;
    enroll(&app, exam_id, 101).await;
    let (status, _) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/exams/{}", exam_id),
        Some(json!({ "start_time": "2025-07-02T09:00:00Z", "end_time": "2025-07-02T12:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A title edit stays permitted.
    let (status, body) = request(
        &app,
        "PUT",
        &format!("/api/exams/{}", exam_id),
        Some(json!({ "title": "Algorithms Midterm (rescheduled hall)" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Algorithms Midterm (rescheduled hall)");
}

#[tokio::test]
async fn hall_ticket_requires_a_seat() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    enroll(&app, exam_id, 101).await;

    let (status, _) = request(
        &app,
        "GET",
        &format!("/api/exams/{}/hall-ticket/{}", exam_id, 101),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn hall_ticket_reflects_the_current_allocation() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    create_room(&app, "Hall A", 30).await;
    enroll(&app, exam_id, 101).await;
    enroll(&app, exam_id, 102).await;
    let (status, _) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/exams/{}/hall-ticket/{}", exam_id, 101),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["seat_number"], "R1-001");
    assert_eq!(body["data"]["room_name"], "Hall A");
    assert_eq!(body["data"]["college_name"], "Test Institute");
    assert_eq!(body["data"]["roll_number"], "R-001");

    // A late enrollment and a re-run move the lowest roll first; the
    // regenerated ticket reflects the new seat without any stored state.
    enroll(&app, exam_id, 103).await;
    let (status, _) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/exams/{}/hall-ticket/{}", exam_id, 103),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["seat_number"], "R1-003");

    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/exams/{}/hall-tickets", exam_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tickets"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["skipped"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn result_flow_records_grades_and_stats() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    for student in [101, 102, 103] {
        enroll(&app, exam_id, student).await;
    }

    for (student, marks) in [(101, 40), (102, 60), (103, 80)] {
        let (status, _) = request(
            &app,
            "POST",
            &format!("/api/exams/{}/results", exam_id),
            Some(json!({ "student_id": student, "marks_obtained": marks })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Duplicate single result is the non-idempotent write guard.
    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/exams/{}/results", exam_id),
        Some(json!({ "student_id": 101, "marks_obtained": 45 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Marks above the exam total are rejected before any write.
    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/exams/{}/results", exam_id),
        Some(json!({ "student_id": 104, "marks_obtained": 101 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/exams/{}/results/stats", exam_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["graded_count"], 3);
    assert_eq!(stats["mean"], 60.0);
    assert_eq!(stats["min"], 40);
    assert_eq!(stats["max"], 80);
    assert!((stats["pass_rate"].as_f64().unwrap() - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn stats_on_an_ungraded_exam_are_undefined_not_zero_division() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;

    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/exams/{}/results/stats", exam_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["graded_count"], 0);
    assert!(body["data"]["mean"].is_null());
    assert!(body["data"]["pass_rate"].is_null());
}

#[tokio::test]
async fn bulk_grade_upserts_all_or_nothing() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    enroll(&app, exam_id, 101).await;
    enroll(&app, exam_id, 102).await;

    // 9999 is not enrolled: the whole batch must abort.
    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/exams/{}/bulk-grade", exam_id),
        Some(json!({ "results": {
            "101": { "marks_obtained": 70 },
            "9999": { "marks_obtained": 50 },
        }})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/exams/{}/results", exam_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // A clean batch grades everyone, and re-grading is the upsert path.
    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/exams/{}/bulk-grade", exam_id),
        Some(json!({ "results": {
            "101": { "marks_obtained": 70 },
            "102": { "marks_obtained": 55, "remarks": "borderline" },
        }})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/exams/{}/bulk-grade", exam_id),
        Some(json!({ "results": { "102": { "marks_obtained": 58 } } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(
        &app,
        "GET",
        &format!("/api/exams/{}/results", exam_id),
        None,
    )
    .await;
    let results = body["data"].as_array().unwrap().clone();
    assert_eq!(results.len(), 2);
    let revised = results
        .iter()
        .find(|r| r["student_id"] == 102)
        .unwrap();
    assert_eq!(revised["marks_obtained"], 58);
}

#[tokio::test]
async fn revaluation_approval_revises_the_result() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    enroll(&app, exam_id, 101).await;
    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/exams/{}/results", exam_id),
        Some(json!({ "student_id": 101, "marks_obtained": 48 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let result_id = body["data"]["id"].as_i64().unwrap();

    // The student files the request under their own identity.
    let (status, body) = request_as(
        &app,
        COLLEGE,
        101,
        "POST",
        "/api/revaluation-requests",
        Some(json!({ "exam_result_id": result_id, "reason": "question 4 was mis-totalled" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let request_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["previous_marks"], 48);

    // Only one pending request at a time.
    let (status, _) = request_as(
        &app,
        COLLEGE,
        101,
        "POST",
        "/api/revaluation-requests",
        Some(json!({ "exam_result_id": result_id, "reason": "second thoughts" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = request(
        &app,
        "PUT",
        &format!("/api/revaluation-requests/{}/approve", request_id),
        Some(json!({ "revised_marks": 52, "comments": "totalling corrected" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["revised_marks"], 52);

    let (_, body) = request(&app, "GET", &format!("/api/results/{}", result_id), None).await;
    assert_eq!(body["data"]["marks_obtained"], 52);

    // The requester was notified of the resolution.
    assert_eq!(app.notifier.sent().len(), 1);
    assert_eq!(app.notifier.sent()[0].student_id, 101);
}

#[tokio::test]
async fn resolved_revaluations_are_terminal() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    enroll(&app, exam_id, 101).await;
    let (_, body) = request(
        &app,
        "POST",
        &format!("/api/exams/{}/results", exam_id),
        Some(json!({ "student_id": 101, "marks_obtained": 48 })),
    )
    .await;
    let result_id = body["data"]["id"].as_i64().unwrap();

    let (_, body) = request_as(
        &app,
        COLLEGE,
        101,
        "POST",
        "/api/revaluation-requests",
        Some(json!({ "exam_result_id": result_id, "reason": "please re-check" })),
    )
    .await;
    let request_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/revaluation-requests/{}/reject", request_id),
        Some(json!({ "comments": "totals verified" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Second resolution of either kind conflicts and the marks stand.
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/revaluation-requests/{}/approve", request_id),
        Some(json!({ "revised_marks": 99 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = request(&app, "GET", &format!("/api/results/{}", result_id), None).await;
    assert_eq!(body["data"]["marks_obtained"], 48);

    // A rejected request does not block a fresh one.
    let (status, _) = request_as(
        &app,
        COLLEGE,
        101,
        "POST",
        "/api/revaluation-requests",
        Some(json!({ "exam_result_id": result_id, "reason": "new evidence" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}
