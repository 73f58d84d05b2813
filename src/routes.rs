// src/routes.rs

use axum::{
    Router,
    http::{HeaderName, Method},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{allocation, enrollments, exams, hall_tickets, results, revaluations, rooms},
    state::AppState,
    utils::context::tenant_context,
};

/// Assembles the main application router.
///
/// * Nests all tenant-scoped sub-routers under `/api`.
/// * Applies the tenant-context middleware ahead of every handler.
/// * Applies global middleware (Trace, CORS) and injects `AppState`.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static("x-college-id"),
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-user-role"),
        ]);

    let exam_routes = Router::new()
        .route("/", post(exams::create_exam).get(exams::list_exams))
        .route(
            "/{id}",
            get(exams::get_exam)
                .put(exams::update_exam)
                .delete(exams::delete_exam),
        )
        .route("/{id}/status", put(exams::update_exam_status))
        .route("/{id}/enroll", post(enrollments::enroll_student))
        .route("/{id}/enroll-bulk", post(enrollments::enroll_bulk))
        .route("/{id}/enrollments", get(enrollments::list_enrollments))
        .route("/{id}/allocate-seats", post(allocation::allocate_seats))
        .route(
            "/{id}/hall-ticket/{student_id}",
            get(hall_tickets::get_hall_ticket),
        )
        .route("/{id}/hall-tickets", get(hall_tickets::list_hall_tickets))
        .route(
            "/{id}/results",
            post(results::create_result).get(results::list_results),
        )
        .route("/{id}/results/stats", get(results::result_stats))
        .route("/{id}/bulk-grade", post(results::bulk_grade));

    let room_routes = Router::new()
        .route("/", post(rooms::create_room).get(rooms::list_rooms))
        .route(
            "/{id}",
            get(rooms::get_room)
                .put(rooms::update_room)
                .delete(rooms::delete_room),
        )
        .route("/{id}/availability", get(rooms::room_availability))
        .route("/{id}/bookings", get(rooms::room_bookings));

    let enrollment_routes = Router::new().route(
        "/{id}",
        put(enrollments::update_enrollment).delete(enrollments::delete_enrollment),
    );

    let student_routes =
        Router::new().route("/{id}/enrollments", get(enrollments::student_enrollments));

    let result_routes = Router::new().route("/{id}", get(results::get_result));

    let revaluation_routes = Router::new()
        .route(
            "/",
            post(revaluations::create_revaluation).get(revaluations::list_revaluations),
        )
        .route("/{id}", get(revaluations::get_revaluation))
        .route("/{id}/approve", put(revaluations::approve_revaluation))
        .route("/{id}/reject", put(revaluations::reject_revaluation));

    Router::new()
        .nest("/api/exams", exam_routes)
        .nest("/api/exam-rooms", room_routes)
        .nest("/api/enrollments", enrollment_routes)
        .nest("/api/students", student_routes)
        .nest("/api/results", result_routes)
        .nest("/api/revaluation-requests", revaluation_routes)
        // Every tenant-scoped route sits behind the context middleware.
        .layer(middleware::from_fn(tenant_context))
        .route("/health", get(health))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
