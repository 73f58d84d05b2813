// src/models/hall_ticket.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::exam::ExamType;

/// Derived admission document for one seated student.
/// Never persisted: regenerating after a re-allocation reflects the new seat.
#[derive(Debug, Serialize)]
pub struct HallTicket {
    pub exam_id: i64,
    pub exam_title: String,
    pub exam_type: ExamType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub college_name: String,
    pub course_code: String,
    pub student_id: i64,
    pub student_name: String,
    pub roll_number: String,
    pub room_id: i64,
    pub room_name: String,
    pub seat_number: String,
    pub question_paper_set: i32,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SkippedTicket {
    pub student_id: i64,
    pub reason: String,
}

/// Batch output: one ticket per seated student, plus the students that had
/// to be skipped (missing profile data and similar).
#[derive(Debug, Serialize)]
pub struct HallTicketBatch {
    pub exam_id: i64,
    pub tickets: Vec<HallTicket>,
    pub skipped: Vec<SkippedTicket>,
}
