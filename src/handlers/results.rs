// src/handlers/results.rs
//
// Grading surface. Single results are create-only (the dedupe guard for a
// non-idempotent write); bulk grading is the upsert path and commits all
// entries or none.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::{TimeoutParams, with_deadline},
    models::exam::Exam,
    models::result::{BulkGradeRequest, CreateResultRequest, ResultStats},
    platform::AuditEvent,
    state::AppState,
    store::GradeEntry,
    utils::context::TenantContext,
    utils::html::clean_html,
};

fn check_marks_ceiling(exam: &Exam, marks: i32) -> Result<(), AppError> {
    if marks > exam.total_marks {
        return Err(AppError::Validation(format!(
            "marks {} exceed the exam's total of {}",
            marks, exam.total_marks
        )));
    }
    Ok(())
}

pub async fn create_result(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<CreateResultRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let exam = state.store.get_exam(ctx.college_id, exam_id).await?;
    check_marks_ceiling(&exam, payload.marks_obtained)?;

    let result = state
        .store
        .create_result(
            ctx.college_id,
            exam_id,
            payload.student_id,
            payload.marks_obtained,
            payload.remarks.as_deref().map(clean_html),
            ctx.user_id,
        )
        .await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "result.created",
            entity: format!("result:{}", result.id),
            detail: json!({ "exam_id": exam_id, "student_id": payload.student_id }),
        })
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "data": result, "status": "ok" })),
    ))
}

pub async fn bulk_grade(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
    Query(timeout): Query<TimeoutParams>,
    Json(payload): Json<BulkGradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.results.is_empty() {
        return Err(AppError::Validation("no results to grade".to_string()));
    }
    let exam = state.store.get_exam(ctx.college_id, exam_id).await?;

    let mut entries = Vec::with_capacity(payload.results.len());
    for (student_id, entry) in payload.results {
        entry
            .validate()
            .map_err(|e| AppError::Validation(format!("student {}: {}", student_id, e)))?;
        check_marks_ceiling(&exam, entry.marks_obtained)?;
        entries.push(GradeEntry {
            student_id,
            marks_obtained: entry.marks_obtained,
            remarks: entry.remarks.as_deref().map(clean_html),
        });
    }
    // Deterministic write order regardless of map iteration.
    entries.sort_by_key(|e| e.student_id);

    let graded = with_deadline(
        &state.config,
        timeout.timeout_ms,
        state
            .store
            .bulk_grade(ctx.college_id, exam_id, entries, ctx.user_id),
    )
    .await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "result.bulk_graded",
            entity: format!("exam:{}", exam_id),
            detail: json!({ "graded": graded.len() }),
        })
        .await;

    Ok(Json(json!({ "data": graded, "status": "ok" })))
}

pub async fn get_result(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(result_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.store.get_result(ctx.college_id, result_id).await?;
    Ok(Json(json!({ "data": result, "status": "ok" })))
}

pub async fn list_results(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let results = state.store.list_results(ctx.college_id, exam_id).await?;
    Ok(Json(json!({ "data": results, "status": "ok" })))
}

pub async fn result_stats(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = state.store.get_exam(ctx.college_id, exam_id).await?;
    let marks = state.store.graded_marks(ctx.college_id, exam_id).await?;
    let stats = ResultStats::from_marks(exam_id, &marks, exam.passing_marks);
    Ok(Json(json!({ "data": stats, "status": "ok" })))
}
