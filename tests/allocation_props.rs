// tests/allocation_props.rs
//
// Seat allocation through the HTTP surface: capacity atomicity,
// determinism, paper-set spread and room booking exclusivity.

mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::*;

fn seated_view(enrollments: &[Value]) -> Vec<(i64, String, i64)> {
    let mut seats: Vec<(i64, String, i64)> = enrollments
        .iter()
        .filter(|e| e["status"] == "seated")
        .map(|e| {
            (
                e["student_id"].as_i64().unwrap(),
                e["seat_number"].as_str().unwrap().to_string(),
                e["question_paper_set"].as_i64().unwrap(),
            )
        })
        .collect();
    seats.sort();
    seats
}

#[tokio::test]
async fn allocation_with_insufficient_capacity_writes_nothing() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    let room_id = create_room(&app, "Tiny", 2).await;
    for student in [101, 102, 103] {
        enroll(&app, exam_id, student).await;
    }

    let (status, body) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");

    // Nobody was seated and no booking was written.
    for enrollment in list_enrollments(&app, exam_id).await {
        assert_eq!(enrollment["status"], "enrolled");
        assert!(enrollment["seat_number"].is_null());
    }
    let (_, body) = request(
        &app,
        "GET",
        &format!(
            "/api/exam-rooms/{}/availability?start_time=2025-07-01T09:00:00Z&end_time=2025-07-01T12:00:00Z",
            room_id
        ),
        None,
    )
    .await;
    assert_eq!(body["data"]["available"], true);
}

#[tokio::test]
async fn allocation_without_enrollments_is_rejected() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    create_room(&app, "Hall A", 30).await;

    let (status, _) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn spec_scenario_two_students_one_room_two_sets() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    create_room(&app, "Hall A", 2).await;
    enroll(&app, exam_id, 101).await;
    enroll(&app, exam_id, 102).await;

    let (status, body) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["students_seated"], 2);
    assert_eq!(body["data"]["rooms_used"][0]["seats_filled"], 2);

    let seats = seated_view(&list_enrollments(&app, exam_id).await);
    assert_eq!(
        seats,
        vec![
            (101, "R1-001".to_string(), 0),
            (102, "R1-002".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn re_running_allocation_is_deterministic() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    create_room(&app, "Hall A", 4).await;
    create_room(&app, "Hall B", 4).await;
    for student in [103, 101, 105, 102, 104, 106] {
        enroll(&app, exam_id, student).await;
    }

    let (status, _) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::OK);
    let first = seated_view(&list_enrollments(&app, exam_id).await);

    let (status, _) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::OK);
    let second = seated_view(&list_enrollments(&app, exam_id).await);

    assert_eq!(first, second);
    // Roll order drives the seating order.
    assert_eq!(first[0], (101, "R1-001".to_string(), 0));
}

#[tokio::test]
async fn students_spill_into_the_next_room_when_the_largest_fills() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    create_room(&app, "Small", 2).await;
    create_room(&app, "Large", 4).await;
    for student in 101..=106 {
        enroll(&app, exam_id, student).await;
    }

    let (status, body) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::OK);

    let rooms_used = body["data"]["rooms_used"].as_array().unwrap();
    assert_eq!(rooms_used.len(), 2);
    assert_eq!(rooms_used[0]["room_name"], "Large");
    assert_eq!(rooms_used[0]["seats_filled"], 4);
    assert_eq!(rooms_used[1]["room_name"], "Small");
    assert_eq!(rooms_used[1]["seats_filled"], 2);

    // Seat labels restart per room ordinal.
    let seats = seated_view(&list_enrollments(&app, exam_id).await);
    assert_eq!(seats[4].1, "R2-001");
}

#[tokio::test]
async fn consecutive_seats_rotate_paper_sets() {
    let app = spawn_app();
    let mut payload = exam_payload();
    payload["question_paper_set_count"] = json!(3);
    let (status, body) = request(&app, "POST", "/api/exams", Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    let exam_id = body["data"]["id"].as_i64().unwrap();

    create_room(&app, "Hall A", 10).await;
    for student in 101..=110 {
        enroll(&app, exam_id, student).await;
    }
    let (status, _) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::OK);

    // Roll order equals seat order here, so adjacency follows student id.
    let seats = seated_view(&list_enrollments(&app, exam_id).await);
    for pair in seats.windows(2) {
        assert_ne!(pair[0].2, pair[1].2, "seats {} and {} share a set", pair[0].1, pair[1].1);
    }
}

#[tokio::test]
async fn a_booked_room_is_not_eligible_for_an_overlapping_exam() {
    let app = spawn_app();
    let first = create_exam(&app).await;
    create_room(&app, "Hall A", 30).await;
    enroll(&app, first, 101).await;
    let (status, _) = allocate(&app, first).await;
    assert_eq!(status, StatusCode::OK);

    // Overlapping window: the only room is booked, so planning fails on
    // capacity.
    let mut payload = exam_payload();
    payload["start_time"] = json!("2025-07-01T10:00:00Z");
    payload["end_time"] = json!("2025-07-01T13:00:00Z");
    let (_, body) = request(&app, "POST", "/api/exams", Some(payload)).await;
    let overlapping = body["data"]["id"].as_i64().unwrap();
    enroll(&app, overlapping, 102).await;

    let (status, _) = allocate(&app, overlapping).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Back-to-back window: intervals are half-open, so the room frees up
    // the moment the first exam ends.
    let mut payload = exam_payload();
    payload["start_time"] = json!("2025-07-01T12:00:00Z");
    payload["end_time"] = json!("2025-07-01T15:00:00Z");
    let (_, body) = request(&app, "POST", "/api/exams", Some(payload)).await;
    let adjacent = body["data"]["id"].as_i64().unwrap();
    enroll(&app, adjacent, 103).await;

    let (status, _) = allocate(&app, adjacent).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn availability_endpoint_tracks_bookings_and_boundaries() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    let room_id = create_room(&app, "Hall A", 30).await;
    enroll(&app, exam_id, 101).await;
    let (status, _) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::OK);

    let check = |start: &str, end: &str| {
        format!(
            "/api/exam-rooms/{}/availability?start_time={}&end_time={}",
            room_id, start, end
        )
    };

    let (_, body) = request(
        &app,
        "GET",
        &check("2025-07-01T10:00:00Z", "2025-07-01T11:00:00Z"),
        None,
    )
    .await;
    assert_eq!(body["data"]["available"], false);

    let (_, body) = request(
        &app,
        "GET",
        &check("2025-07-01T12:00:00Z", "2025-07-01T14:00:00Z"),
        None,
    )
    .await;
    assert_eq!(body["data"]["available"], true);

    let (status, _) = request(
        &app,
        "GET",
        &check("2025-07-01T14:00:00Z", "2025-07-01T12:00:00Z"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The bookings listing names the exam occupying the slot.
    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/exam-rooms/{}/bookings", room_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let bookings = body["data"].as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["exam_id"].as_i64().unwrap(), exam_id);
}

#[tokio::test]
async fn inactive_rooms_are_never_planned() {
    let app = spawn_app();
    let exam_id = create_exam(&app).await;
    let room_id = create_room(&app, "Closed Wing", 50).await;
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/exam-rooms/{}", room_id),
        Some(json!({ "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    enroll(&app, exam_id, 101).await;

    let (status, _) = allocate(&app, exam_id).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
