// src/handlers/enrollments.rs
//
// Enrollment lifecycle. Single enrollment is an upsert (duplicates are a
// no-op, cancelled rows reactivate); the bulk endpoint reports per-student
// outcomes instead of aborting on the first failure.

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
    models::enrollment::{
        BulkEnrollRequest, EnrollOutcome, EnrollOutcomeKind, EnrollRequest,
        UpdateEnrollmentRequest,
    },
    models::exam::{Exam, ExamStatus},
    platform::AuditEvent,
    state::AppState,
    utils::context::TenantContext,
};

fn ensure_enrollment_open(exam: &Exam) -> Result<(), AppError> {
    if exam.status != ExamStatus::Scheduled {
        return Err(AppError::Conflict(format!(
            "enrollment is only open while the exam is scheduled, not {}",
            exam.status
        )));
    }
    Ok(())
}

pub async fn enroll_student(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<EnrollRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exam = state.store.get_exam(ctx.college_id, exam_id).await?;
    ensure_enrollment_open(&exam)?;
    state
        .directory
        .get_student(ctx.college_id, payload.student_id)
        .await?;

    let (enrollment, outcome) = state
        .store
        .enroll_student(ctx.college_id, exam_id, payload.student_id)
        .await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "enrollment.created",
            entity: format!("enrollment:{}", enrollment.id),
            detail: json!({ "exam_id": exam_id, "student_id": payload.student_id, "outcome": outcome }),
        })
        .await;

    let code = match outcome {
        EnrollOutcomeKind::AlreadyEnrolled => StatusCode::OK,
        _ => StatusCode::CREATED,
    };
    Ok((
        code,
        Json(json!({
            "data": { "enrollment": enrollment, "outcome": outcome },
            "status": "ok",
        })),
    ))
}

pub async fn enroll_bulk(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
    Query(timeout): Query<TimeoutParams>,
    Json(payload): Json<BulkEnrollRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let exam = state.store.get_exam(ctx.college_id, exam_id).await?;
    ensure_enrollment_open(&exam)?;

    let outcomes = with_deadline(&state.config, timeout.timeout_ms, async {
        let mut outcomes = Vec::with_capacity(payload.student_ids.len());
        for student_id in payload.student_ids {
            let outcome = match state.directory.get_student(ctx.college_id, student_id).await {
                Err(err) => EnrollOutcome {
                    student_id,
                    outcome: EnrollOutcomeKind::Failed,
                    detail: Some(err.to_string()),
                },
                Ok(_) => match state
                    .store
                    .enroll_student(ctx.college_id, exam_id, student_id)
                    .await
                {
                    Ok((_, kind)) => EnrollOutcome {
                        student_id,
                        outcome: kind,
                        detail: None,
                    },
                    Err(err) => EnrollOutcome {
                        student_id,
                        outcome: EnrollOutcomeKind::Failed,
                        detail: Some(err.to_string()),
                    },
                },
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    })
    .await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "enrollment.bulk",
            entity: format!("exam:{}", exam_id),
            detail: json!({
                "requested": outcomes.len(),
                "failed": outcomes
                    .iter()
                    .filter(|o| o.outcome == EnrollOutcomeKind::Failed)
                    .count(),
            }),
        })
        .await;

    Ok(Json(json!({ "data": { "outcomes": outcomes }, "status": "ok" })))
}

pub async fn list_enrollments(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let enrollments = state.store.list_enrollments(ctx.college_id, exam_id).await?;
    Ok(Json(json!({ "data": enrollments, "status": "ok" })))
}

pub async fn student_enrollments(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let enrollments = state
        .store
        .student_enrollments(ctx.college_id, student_id)
        .await?;
    Ok(Json(json!({ "data": enrollments, "status": "ok" })))
}

pub async fn update_enrollment(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(enrollment_id): Path<i64>,
    Json(payload): Json<UpdateEnrollmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let enrollment = state
        .store
        .update_enrollment_status(ctx.college_id, enrollment_id, payload.status)
        .await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "enrollment.status_changed",
            entity: format!("enrollment:{}", enrollment_id),
            detail: json!({ "status": enrollment.status }),
        })
        .await;

    Ok(Json(json!({ "data": enrollment, "status": "ok" })))
}

pub async fn delete_enrollment(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(enrollment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state
        .store
        .delete_enrollment(ctx.college_id, enrollment_id)
        .await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "enrollment.deleted",
            entity: format!("enrollment:{}", enrollment_id),
            detail: json!({}),
        })
        .await;

    Ok(Json(
        json!({ "data": { "id": enrollment_id, "deleted": true }, "status": "ok" }),
    ))
}
