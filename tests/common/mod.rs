// tests/common/mod.rs
//
// In-process test harness: the real router over the in-memory store, with
// a seeded directory and a capturing notifier. No database, no network.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use exam_backend::config::Config;
use exam_backend::platform::{
    College, Course, LogAuditSink, MemoryDirectory, MemoryNotifier, Student,
};
use exam_backend::routes::create_router;
use exam_backend::state::AppState;
use exam_backend::store::MemoryExamStore;

pub const COLLEGE: i64 = 1;
pub const OTHER_COLLEGE: i64 = 2;
pub const OPERATOR: i64 = 900;
pub const COURSE: i64 = 10;

pub struct TestApp {
    pub router: Router,
    pub notifier: Arc<MemoryNotifier>,
}

fn test_config() -> Config {
    Config {
        database_url: None,
        bind_addr: "127.0.0.1:0".to_string(),
        rust_log: "error".to_string(),
        default_op_timeout_ms: 5_000,
        max_op_timeout_ms: 10_000,
        seed_demo: false,
    }
}

/// Builds the app with two colleges; college 1 has students 101..=120 whose
/// roll numbers ascend with their ids, college 2 has student 201.
pub fn spawn_app() -> TestApp {
    let directory = MemoryDirectory::new();
    directory.add_college(College {
        id: COLLEGE,
        name: "Test Institute".to_string(),
    });
    directory.add_college(College {
        id: OTHER_COLLEGE,
        name: "Other Institute".to_string(),
    });
    directory.add_course(Course {
        id: COURSE,
        college_id: COLLEGE,
        code: "CS101".to_string(),
        title: "Algorithms".to_string(),
    });
    for id in 101..=120_i64 {
        directory.add_student(Student {
            id,
            college_id: COLLEGE,
            name: format!("Student {}", id),
            roll_number: format!("R-{:03}", id - 100),
        });
    }
    directory.add_student(Student {
        id: 201,
        college_id: OTHER_COLLEGE,
        name: "Outsider".to_string(),
        roll_number: "X-001".to_string(),
    });

    let notifier = Arc::new(MemoryNotifier::new());
    let state = AppState {
        store: Arc::new(MemoryExamStore::new()),
        directory: Arc::new(directory),
        audit: Arc::new(LogAuditSink),
        notifier: notifier.clone(),
        config: test_config(),
    };
    TestApp {
        router: create_router(state),
        notifier,
    }
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body read failed");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is not JSON")
    }
}

pub async fn request_as(
    app: &TestApp,
    college_id: i64,
    user_id: i64,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("x-college-id", college_id)
        .header("x-user-id", user_id)
        .header("x-user-role", "admin");
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            builder.body(Body::empty()).unwrap()
        }
    };
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router call failed");
    let status = response.status();
    (status, read_json_body(response).await)
}

pub async fn request(
    app: &TestApp,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    request_as(app, COLLEGE, OPERATOR, method, path, body).await
}

pub fn exam_payload() -> Value {
    serde_json::json!({
        "course_id": COURSE,
        "title": "Algorithms Midterm",
        "exam_type": "midterm",
        "start_time": "2025-07-01T09:00:00Z",
        "end_time": "2025-07-01T12:00:00Z",
        "duration_minutes": 180,
        "total_marks": 100,
        "passing_marks": 50,
        "question_paper_set_count": 2,
    })
}

pub async fn create_exam(app: &TestApp) -> i64 {
    let (status, body) = request(app, "POST", "/api/exams", Some(exam_payload())).await;
    assert_eq!(status, StatusCode::CREATED, "exam create failed: {}", body);
    body["data"]["id"].as_i64().unwrap()
}

pub async fn create_room(app: &TestApp, name: &str, capacity: i32) -> i64 {
    let (status, body) = request(
        app,
        "POST",
        "/api/exam-rooms",
        Some(serde_json::json!({ "name": name, "capacity": capacity })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "room create failed: {}", body);
    body["data"]["id"].as_i64().unwrap()
}

pub async fn enroll(app: &TestApp, exam_id: i64, student_id: i64) {
    let (status, body) = request(
        app,
        "POST",
        &format!("/api/exams/{}/enroll", exam_id),
        Some(serde_json::json!({ "student_id": student_id })),
    )
    .await;
    assert!(
        status == StatusCode::CREATED || status == StatusCode::OK,
        "enroll failed: {}",
        body
    );
}

pub async fn allocate(app: &TestApp, exam_id: i64) -> (StatusCode, Value) {
    request(
        app,
        "POST",
        &format!("/api/exams/{}/allocate-seats", exam_id),
        None,
    )
    .await
}

pub async fn list_enrollments(app: &TestApp, exam_id: i64) -> Vec<Value> {
    let (status, body) = request(
        app,
        "GET",
        &format!("/api/exams/{}/enrollments", exam_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"].as_array().unwrap().clone()
}
