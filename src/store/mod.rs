// src/store/mod.rs
//
// Data-access boundary of the exam subsystem. Every method takes the
// caller's college id so tenant isolation is testable per operation, and
// every multi-entity workflow (status cascade, allocation apply, bulk
// grading, revaluation resolution) is a single trait method so both
// backends keep it atomic.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::enrollment::{EnrollOutcomeKind, EnrollmentStatus, ExamEnrollment};
use crate::models::exam::{Exam, ExamListParams, ExamStatus};
use crate::models::result::ExamResult;
use crate::models::revaluation::{
    RevaluationDecision, RevaluationListParams, RevaluationRequest,
};
use crate::models::room::{ExamRoom, RoomBooking};
use crate::seating::AllocationPlan;

pub use memory::MemoryExamStore;
pub use postgres::PgExamStore;

/// Field set for a new exam, assembled by the handler after validation.
#[derive(Debug, Clone)]
pub struct NewExam {
    pub course_id: i64,
    pub title: String,
    pub exam_type: crate::models::exam::ExamType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub total_marks: i32,
    pub passing_marks: i32,
    pub question_paper_set_count: i32,
    pub created_by: i64,
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub capacity: i32,
    pub is_active: bool,
}

/// One entry of a bulk grading batch, already range-checked by the handler.
#[derive(Debug, Clone)]
pub struct GradeEntry {
    pub student_id: i64,
    pub marks_obtained: i32,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRevaluation {
    pub exam_result_id: i64,
    pub student_id: i64,
    pub reason: String,
}

#[async_trait]
pub trait ExamStore: Send + Sync {
    // --- exam registry ---

    async fn create_exam(&self, college_id: i64, exam: NewExam) -> Result<Exam, AppError>;
    async fn get_exam(&self, college_id: i64, exam_id: i64) -> Result<Exam, AppError>;
    async fn list_exams(
        &self,
        college_id: i64,
        params: &ExamListParams,
    ) -> Result<Vec<Exam>, AppError>;

    /// Persists an already-merged exam record. Record-level invariant
    /// checks happen in the handler before the merge reaches the store;
    /// the store itself refuses with Conflict when the merge changes
    /// seating inputs (times, paper-set count) while any enrollment is
    /// `seated`, atomically with the write.
    async fn update_exam(&self, college_id: i64, exam: &Exam) -> Result<Exam, AppError>;

    /// Deletes the exam with its enrollments and bookings in one unit.
    /// Fails with Conflict once any enrollment progressed past `enrolled`
    /// or any result exists.
    async fn delete_exam(&self, college_id: i64, exam_id: i64) -> Result<(), AppError>;

    /// Applies one step of the exam status machine. Cancellation releases
    /// the exam's bookings and cancels its enrollments in the same unit.
    async fn transition_exam(
        &self,
        college_id: i64,
        exam_id: i64,
        to: ExamStatus,
    ) -> Result<Exam, AppError>;

    /// True when any enrollment of the exam is currently `seated`.
    async fn has_seated_enrollments(
        &self,
        college_id: i64,
        exam_id: i64,
    ) -> Result<bool, AppError>;

    // --- enrollment manager ---

    /// Upserts the (exam, student) enrollment: a live row is a no-op, a
    /// cancelled row is reactivated, otherwise a fresh row is created.
    /// Conflict unless the exam is still `scheduled`, checked atomically
    /// with the write.
    async fn enroll_student(
        &self,
        college_id: i64,
        exam_id: i64,
        student_id: i64,
    ) -> Result<(ExamEnrollment, EnrollOutcomeKind), AppError>;

    async fn get_enrollment(
        &self,
        college_id: i64,
        enrollment_id: i64,
    ) -> Result<ExamEnrollment, AppError>;
    async fn find_enrollment(
        &self,
        college_id: i64,
        exam_id: i64,
        student_id: i64,
    ) -> Result<Option<ExamEnrollment>, AppError>;
    async fn list_enrollments(
        &self,
        college_id: i64,
        exam_id: i64,
    ) -> Result<Vec<ExamEnrollment>, AppError>;
    async fn student_enrollments(
        &self,
        college_id: i64,
        student_id: i64,
    ) -> Result<Vec<ExamEnrollment>, AppError>;

    /// Operator-driven status change, checked against the enrollment
    /// transition table inside the store.
    async fn update_enrollment_status(
        &self,
        college_id: i64,
        enrollment_id: i64,
        to: EnrollmentStatus,
    ) -> Result<ExamEnrollment, AppError>;

    /// Physical delete while still `enrolled`; seated/absent rows are
    /// cancelled instead, cancelled rows are left alone.
    async fn delete_enrollment(
        &self,
        college_id: i64,
        enrollment_id: i64,
    ) -> Result<(), AppError>;

    // --- room availability index ---

    async fn create_room(&self, college_id: i64, room: NewRoom) -> Result<ExamRoom, AppError>;
    async fn get_room(&self, college_id: i64, room_id: i64) -> Result<ExamRoom, AppError>;
    async fn list_rooms(
        &self,
        college_id: i64,
        active: Option<bool>,
    ) -> Result<Vec<ExamRoom>, AppError>;
    async fn update_room(&self, college_id: i64, room: &ExamRoom) -> Result<ExamRoom, AppError>;

    /// Conflict while any booking references the room.
    async fn delete_room(&self, college_id: i64, room_id: i64) -> Result<(), AppError>;

    async fn room_bookings(
        &self,
        college_id: i64,
        room_id: i64,
    ) -> Result<Vec<RoomBooking>, AppError>;

    /// Half-open interval check: true iff no booking for the room overlaps
    /// `[start, end)`. Back-to-back bookings do not count as overlap.
    async fn is_room_available(
        &self,
        college_id: i64,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    // --- seat allocation ---

    /// Active rooms of the college that carry no booking overlapping
    /// `[start, end)` other than the given exam's own (those are about to
    /// be released by the re-allocation).
    async fn eligible_rooms(
        &self,
        college_id: i64,
        exam_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ExamRoom>, AppError>;

    /// Atomically applies a planned allocation: releases the exam's prior
    /// bookings and seat assignments, re-checks the target rooms against
    /// foreign bookings under lock, inserts one booking per used room and
    /// seats every planned enrollment. A room lost to a concurrent booking
    /// fails the whole apply with Conflict and leaves nothing written.
    async fn apply_allocation(
        &self,
        college_id: i64,
        exam_id: i64,
        plan: &AllocationPlan,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), AppError>;

    // --- results & revaluation ---

    /// Creates a graded result row; a second result for the same student
    /// is a Conflict. The student must hold a non-cancelled enrollment.
    async fn create_result(
        &self,
        college_id: i64,
        exam_id: i64,
        student_id: i64,
        marks_obtained: i32,
        remarks: Option<String>,
        evaluated_by: Option<i64>,
    ) -> Result<ExamResult, AppError>;

    /// Upsert-grades every entry in one unit; any entry without a
    /// non-cancelled enrollment aborts the whole batch.
    async fn bulk_grade(
        &self,
        college_id: i64,
        exam_id: i64,
        entries: Vec<GradeEntry>,
        evaluated_by: Option<i64>,
    ) -> Result<Vec<ExamResult>, AppError>;

    async fn get_result(&self, college_id: i64, result_id: i64) -> Result<ExamResult, AppError>;
    async fn list_results(
        &self,
        college_id: i64,
        exam_id: i64,
    ) -> Result<Vec<ExamResult>, AppError>;

    /// Marks of all graded results for the exam, for statistics.
    async fn graded_marks(&self, college_id: i64, exam_id: i64) -> Result<Vec<i32>, AppError>;

    /// Files a revaluation request against a graded result. A second
    /// request is allowed only once no pending one remains.
    async fn create_revaluation(
        &self,
        college_id: i64,
        revaluation: NewRevaluation,
    ) -> Result<RevaluationRequest, AppError>;

    async fn get_revaluation(
        &self,
        college_id: i64,
        request_id: i64,
    ) -> Result<RevaluationRequest, AppError>;
    async fn list_revaluations(
        &self,
        college_id: i64,
        params: &RevaluationListParams,
    ) -> Result<Vec<RevaluationRequest>, AppError>;

    /// Resolves a pending request under an optimistic status guard; the
    /// losing writer of a concurrent resolution gets Conflict. Approval
    /// revises the underlying result's marks in the same unit.
    async fn resolve_revaluation(
        &self,
        college_id: i64,
        request_id: i64,
        resolved_by: Option<i64>,
        decision: RevaluationDecision,
    ) -> Result<RevaluationRequest, AppError>;
}
