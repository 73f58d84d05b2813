// src/handlers/revaluations.rs
//
// Revaluation workflow: a student files a request against their graded
// result, an operator approves (revising the marks) or rejects it. Both
// resolutions are terminal; the store enforces the pending guard.

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
    models::revaluation::{
        ApproveRevaluationRequest, CreateRevaluationRequest, RejectRevaluationRequest,
        RevaluationDecision, RevaluationListParams,
    },
    platform::{AuditEvent, Notification},
    state::AppState,
    store::NewRevaluation,
    utils::context::TenantContext,
    utils::html::clean_html,
};

pub async fn create_revaluation(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(payload): Json<CreateRevaluationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    // The requester is the student; their identity comes from the gateway.
    let student_id = ctx
        .user_id
        .ok_or_else(|| AppError::Unauthorized("caller identity required".to_string()))?;

    let request = state
        .store
        .create_revaluation(
            ctx.college_id,
            NewRevaluation {
                exam_result_id: payload.exam_result_id,
                student_id,
                reason: clean_html(&payload.reason),
            },
        )
        .await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "revaluation.requested",
            entity: format!("revaluation:{}", request.id),
            detail: json!({ "exam_result_id": payload.exam_result_id }),
        })
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "data": request, "status": "ok" })),
    ))
}

pub async fn list_revaluations(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<RevaluationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let requests = state.store.list_revaluations(ctx.college_id, &params).await?;
    Ok(Json(json!({ "data": requests, "status": "ok" })))
}

pub async fn get_revaluation(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(request_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let request = state.store.get_revaluation(ctx.college_id, request_id).await?;
    Ok(Json(json!({ "data": request, "status": "ok" })))
}

pub async fn approve_revaluation(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(request_id): Path<i64>,
    Json(payload): Json<ApproveRevaluationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let request = state.store.get_revaluation(ctx.college_id, request_id).await?;
    let exam = state.store.get_exam(ctx.college_id, request.exam_id).await?;
    if payload.revised_marks > exam.total_marks {
        return Err(AppError::Validation(format!(
            "revised marks {} exceed the exam's total of {}",
            payload.revised_marks, exam.total_marks
        )));
    }

    let request = state
        .store
        .resolve_revaluation(
            ctx.college_id,
            request_id,
            ctx.user_id,
            RevaluationDecision::Approve {
                revised_marks: payload.revised_marks,
                comments: payload.comments.as_deref().map(clean_html),
            },
        )
        .await?;

    state
        .notifier
        .send(Notification {
            college_id: ctx.college_id,
            student_id: request.student_id,
            subject: format!("Revaluation approved: {}", exam.title),
            body: format!(
                "Your revaluation request was approved; marks revised from {} to {}.",
                request.previous_marks, payload.revised_marks
            ),
        })
        .await;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "revaluation.approved",
            entity: format!("revaluation:{}", request_id),
            detail: json!({
                "previous_marks": request.previous_marks,
                "revised_marks": payload.revised_marks,
            }),
        })
        .await;

    Ok(Json(json!({ "data": request, "status": "ok" })))
}

pub async fn reject_revaluation(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(request_id): Path<i64>,
    Json(payload): Json<RejectRevaluationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let request = state
        .store
        .resolve_revaluation(
            ctx.college_id,
            request_id,
            ctx.user_id,
            RevaluationDecision::Reject {
                comments: clean_html(&payload.comments),
            },
        )
        .await?;

    state
        .notifier
        .send(Notification {
            college_id: ctx.college_id,
            student_id: request.student_id,
            subject: "Revaluation rejected".to_string(),
            body: "Your revaluation request was reviewed and rejected; the recorded marks stand."
                .to_string(),
        })
        .await;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "revaluation.rejected",
            entity: format!("revaluation:{}", request_id),
            detail: json!({}),
        })
        .await;

    Ok(Json(json!({ "data": request, "status": "ok" })))
}
