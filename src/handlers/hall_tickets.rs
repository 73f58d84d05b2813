// src/handlers/hall_tickets.rs
//
// Hall tickets are derived views over exam + enrollment + directory data,
// never persisted; regenerating after a re-allocation reflects the new
// seat by construction.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::{
    error::AppError,
    models::enrollment::{EnrollmentStatus, ExamEnrollment},
    models::exam::Exam,
    models::hall_ticket::{HallTicket, HallTicketBatch, SkippedTicket},
    state::AppState,
    utils::context::TenantContext,
};

async fn build_ticket(
    state: &AppState,
    college_id: i64,
    exam: &Exam,
    enrollment: &ExamEnrollment,
) -> Result<HallTicket, AppError> {
    let seat_number = enrollment
        .seat_number
        .clone()
        .ok_or_else(|| AppError::Store("seated enrollment is missing its seat".to_string()))?;
    let room_id = enrollment
        .room_id
        .ok_or_else(|| AppError::Store("seated enrollment is missing its room".to_string()))?;
    let question_paper_set = enrollment
        .question_paper_set
        .ok_or_else(|| AppError::Store("seated enrollment is missing its paper set".to_string()))?;

    let student = state
        .directory
        .get_student(college_id, enrollment.student_id)
        .await?;
    let college = state.directory.resolve_college(college_id).await?;
    let course = state.directory.get_course(college_id, exam.course_id).await?;
    let room = state.store.get_room(college_id, room_id).await?;

    Ok(HallTicket {
        exam_id: exam.id,
        exam_title: exam.title.clone(),
        exam_type: exam.exam_type,
        start_time: exam.start_time,
        end_time: exam.end_time,
        duration_minutes: exam.duration_minutes,
        college_name: college.name,
        course_code: course.code,
        student_id: student.id,
        student_name: student.name,
        roll_number: student.roll_number,
        room_id,
        room_name: room.name,
        seat_number,
        question_paper_set,
        issued_at: Utc::now(),
    })
}

pub async fn get_hall_ticket(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path((exam_id, student_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let exam = state.store.get_exam(ctx.college_id, exam_id).await?;
    let enrollment = state
        .store
        .find_enrollment(ctx.college_id, exam_id, student_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "student {} is not enrolled in exam {}",
                student_id, exam_id
            ))
        })?;
    if enrollment.status != EnrollmentStatus::Seated {
        return Err(AppError::NotAllocated(format!(
            "no seat allocated yet for student {} in exam {}",
            student_id, exam_id
        )));
    }

    let ticket = build_ticket(&state, ctx.college_id, &exam, &enrollment).await?;
    Ok(Json(json!({ "data": ticket, "status": "ok" })))
}

pub async fn list_hall_tickets(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = state.store.get_exam(ctx.college_id, exam_id).await?;
    let enrollments = state.store.list_enrollments(ctx.college_id, exam_id).await?;

    let mut tickets = Vec::new();
    let mut skipped = Vec::new();
    for enrollment in enrollments
        .iter()
        .filter(|e| e.status == EnrollmentStatus::Seated)
    {
        // One broken profile must not sink the whole batch.
        match build_ticket(&state, ctx.college_id, &exam, enrollment).await {
            Ok(ticket) => tickets.push(ticket),
            Err(err) => skipped.push(SkippedTicket {
                student_id: enrollment.student_id,
                reason: err.to_string(),
            }),
        }
    }

    let batch = HallTicketBatch {
        exam_id,
        tickets,
        skipped,
    };
    Ok(Json(json!({ "data": batch, "status": "ok" })))
}
