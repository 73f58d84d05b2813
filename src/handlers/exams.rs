// src/handlers/exams.rs
//
// Exam registry: CRUD plus the explicit status machine. Validation runs at
// the boundary before any write reaches the store.

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
    models::enrollment::EnrollmentStatus,
    models::exam::{
        CreateExamRequest, ExamListParams, ExamStatus, UpdateExamRequest, UpdateExamStatusRequest,
        check_exam_invariants,
    },
    platform::{AuditEvent, Notification},
    state::AppState,
    store::NewExam,
    utils::context::TenantContext,
};

pub async fn create_exam(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    check_exam_invariants(
        payload.start_time,
        payload.end_time,
        payload.total_marks,
        payload.passing_marks,
    )?;

    // The course must exist in this college before an exam can target it.
    state
        .directory
        .get_course(ctx.college_id, payload.course_id)
        .await?;

    let exam = state
        .store
        .create_exam(
            ctx.college_id,
            NewExam {
                course_id: payload.course_id,
                title: payload.title,
                exam_type: payload.exam_type,
                start_time: payload.start_time,
                end_time: payload.end_time,
                duration_minutes: payload.duration_minutes,
                total_marks: payload.total_marks,
                passing_marks: payload.passing_marks,
                question_paper_set_count: payload.question_paper_set_count,
                created_by: ctx.user_id.unwrap_or(0),
            },
        )
        .await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "exam.created",
            entity: format!("exam:{}", exam.id),
            detail: json!({ "title": exam.title, "course_id": exam.course_id }),
        })
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "data": exam, "status": "ok" })),
    ))
}

pub async fn list_exams(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<ExamListParams>,
) -> Result<impl IntoResponse, AppError> {
    let exams = state.store.list_exams(ctx.college_id, &params).await?;
    Ok(Json(json!({ "data": exams, "status": "ok" })))
}

pub async fn get_exam(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = state.store.get_exam(ctx.college_id, exam_id).await?;
    Ok(Json(json!({ "data": exam, "status": "ok" })))
}

pub async fn update_exam(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if payload.is_empty() {
        return Err(AppError::Validation("no fields to update".to_string()));
    }

    let exam = state.store.get_exam(ctx.college_id, exam_id).await?;
    let merged = exam.apply_update(&payload)?;

    // Times and paper-set count feed the existing seat allocation; once
    // students are seated those edits would leave stale bookings behind.
    if exam.seating_inputs_changed(&merged)
        && state
            .store
            .has_seated_enrollments(ctx.college_id, exam_id)
            .await?
    {
        return Err(AppError::Conflict(
            "exam schedule cannot change while students are seated; release the allocation first"
                .to_string(),
        ));
    }

    let updated = state.store.update_exam(ctx.college_id, &merged).await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "exam.updated",
            entity: format!("exam:{}", exam_id),
            detail: json!({}),
        })
        .await;

    Ok(Json(json!({ "data": updated, "status": "ok" })))
}

pub async fn delete_exam(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.store.delete_exam(ctx.college_id, exam_id).await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "exam.deleted",
            entity: format!("exam:{}", exam_id),
            detail: json!({}),
        })
        .await;

    Ok(Json(
        json!({ "data": { "id": exam_id, "deleted": true }, "status": "ok" }),
    ))
}

pub async fn update_exam_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<UpdateExamStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Snapshot the students to notify before cancellation flips their rows.
    let to_notify = if payload.status == ExamStatus::Cancelled {
        state
            .store
            .list_enrollments(ctx.college_id, exam_id)
            .await?
            .into_iter()
            .filter(|e| e.status != EnrollmentStatus::Cancelled)
            .map(|e| e.student_id)
            .collect()
    } else {
        Vec::new()
    };

    let exam = state
        .store
        .transition_exam(ctx.college_id, exam_id, payload.status)
        .await?;

    if payload.status == ExamStatus::Cancelled {
        for student_id in to_notify {
            state
                .notifier
                .send(Notification {
                    college_id: ctx.college_id,
                    student_id,
                    subject: format!("Exam cancelled: {}", exam.title),
                    body: format!(
                        "The exam '{}' scheduled for {} has been cancelled.",
                        exam.title, exam.start_time
                    ),
                })
                .await;
        }
    }

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "exam.status_changed",
            entity: format!("exam:{}", exam_id),
            detail: json!({ "status": exam.status }),
        })
        .await;

    Ok(Json(json!({ "data": exam, "status": "ok" })))
}
