// src/handlers/allocation.rs
//
// Seat allocation endpoint: snapshot enrollments and eligible rooms, run
// the pure planner, then hand the plan to the store for one atomic apply.
// Re-invocation releases the previous allocation first, so the endpoint is
// the idempotent re-allocation path after late enrollments or room changes.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    handlers::{TimeoutParams, with_deadline},
    models::enrollment::EnrollmentStatus,
    models::exam::ExamStatus,
    platform::AuditEvent,
    seating::{AllocationSummary, SeatCandidate, plan_allocation},
    state::AppState,
    utils::context::TenantContext,
};

pub async fn allocate_seats(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
    Query(timeout): Query<TimeoutParams>,
) -> Result<impl IntoResponse, AppError> {
    let exam = state.store.get_exam(ctx.college_id, exam_id).await?;
    if !matches!(exam.status, ExamStatus::Scheduled | ExamStatus::Ongoing) {
        return Err(AppError::Conflict(format!(
            "seats can only be allocated while the exam is scheduled or ongoing, not {}",
            exam.status
        )));
    }

    // Seated rows are candidates too: the apply step releases them before
    // re-seating, which is what makes re-allocation idempotent.
    let enrollments = state.store.list_enrollments(ctx.college_id, exam_id).await?;
    let mut candidates = Vec::new();
    for enrollment in enrollments.iter().filter(|e| {
        matches!(
            e.status,
            EnrollmentStatus::Enrolled | EnrollmentStatus::Seated
        )
    }) {
        // A student missing from the directory fails the whole run; a
        // partially-seated exam would be harder to audit than a retry.
        let student = state
            .directory
            .get_student(ctx.college_id, enrollment.student_id)
            .await?;
        candidates.push(SeatCandidate {
            enrollment_id: enrollment.id,
            student_id: enrollment.student_id,
            roll_number: student.roll_number,
        });
    }
    if candidates.is_empty() {
        return Err(AppError::Validation(format!(
            "exam {} has no enrolled students to seat",
            exam_id
        )));
    }

    let rooms = state
        .store
        .eligible_rooms(ctx.college_id, exam_id, exam.start_time, exam.end_time)
        .await?;

    let plan = plan_allocation(&candidates, &rooms, exam.question_paper_set_count)?;

    with_deadline(
        &state.config,
        timeout.timeout_ms,
        state
            .store
            .apply_allocation(ctx.college_id, exam_id, &plan, exam.start_time, exam.end_time),
    )
    .await?;

    state
        .audit
        .record(AuditEvent {
            college_id: ctx.college_id,
            actor_id: ctx.user_id,
            action: "exam.seats_allocated",
            entity: format!("exam:{}", exam_id),
            detail: json!({
                "students_seated": plan.assignments.len(),
                "rooms_used": plan.rooms_used.len(),
            }),
        })
        .await;

    let summary = AllocationSummary {
        exam_id,
        students_seated: plan.assignments.len(),
        question_paper_set_count: exam.question_paper_set_count,
        rooms_used: plan.rooms_used,
    };
    Ok(Json(json!({ "data": summary, "status": "ok" })))
}
