// src/store/memory.rs
//
// Mutex-guarded maps implementing `ExamStore`. Every trait method takes
// the lock once and releases it before returning, so each operation is
// atomic and the observable semantics match the Postgres backend. Used by
// the test suites and by database-less runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::AppError;
use crate::models::enrollment::{EnrollOutcomeKind, EnrollmentStatus, ExamEnrollment};
use crate::models::exam::{Exam, ExamListParams, ExamStatus};
use crate::models::result::ExamResult;
use crate::models::revaluation::{
    RevaluationDecision, RevaluationListParams, RevaluationRequest, RevaluationStatus,
};
use crate::models::room::{ExamRoom, RoomBooking, intervals_overlap};
use crate::seating::AllocationPlan;
use crate::store::{ExamStore, GradeEntry, NewExam, NewRevaluation, NewRoom};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    exams: BTreeMap<i64, Exam>,
    rooms: BTreeMap<i64, ExamRoom>,
    enrollments: BTreeMap<i64, ExamEnrollment>,
    bookings: BTreeMap<i64, RoomBooking>,
    results: BTreeMap<i64, ExamResult>,
    revaluations: BTreeMap<i64, RevaluationRequest>,
}

impl MemoryState {
    fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn exam(&self, college_id: i64, exam_id: i64) -> Result<&Exam, AppError> {
        self.exams
            .get(&exam_id)
            .filter(|e| e.college_id == college_id)
            .ok_or_else(|| AppError::NotFound(format!("exam {} not found", exam_id)))
    }

    fn room(&self, college_id: i64, room_id: i64) -> Result<&ExamRoom, AppError> {
        self.rooms
            .get(&room_id)
            .filter(|r| r.college_id == college_id)
            .ok_or_else(|| AppError::NotFound(format!("room {} not found", room_id)))
    }

    fn room_is_free(
        &self,
        room_id: i64,
        exclude_exam: Option<i64>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> bool {
        !self.bookings.values().any(|b| {
            b.room_id == room_id
                && exclude_exam != Some(b.exam_id)
                && intervals_overlap(b.start_time, b.end_time, start, end)
        })
    }
}

#[derive(Default)]
pub struct MemoryExamStore {
    inner: Mutex<MemoryState>,
}

impl MemoryExamStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

#[async_trait]
impl ExamStore for MemoryExamStore {
    async fn create_exam(&self, college_id: i64, exam: NewExam) -> Result<Exam, AppError> {
        let mut state = self.lock();
        let id = state.alloc_id();
        let now = Utc::now();
        let record = Exam {
            id,
            college_id,
            course_id: exam.course_id,
            title: exam.title,
            exam_type: exam.exam_type,
            start_time: exam.start_time,
            end_time: exam.end_time,
            duration_minutes: exam.duration_minutes,
            total_marks: exam.total_marks,
            passing_marks: exam.passing_marks,
            status: ExamStatus::Scheduled,
            question_paper_set_count: exam.question_paper_set_count,
            created_by: exam.created_by,
            created_at: Some(now),
            updated_at: Some(now),
        };
        state.exams.insert(id, record.clone());
        Ok(record)
    }

    async fn get_exam(&self, college_id: i64, exam_id: i64) -> Result<Exam, AppError> {
        let state = self.lock();
        state.exam(college_id, exam_id).cloned()
    }

    async fn list_exams(
        &self,
        college_id: i64,
        params: &ExamListParams,
    ) -> Result<Vec<Exam>, AppError> {
        let state = self.lock();
        let mut exams: Vec<Exam> = state
            .exams
            .values()
            .filter(|e| e.college_id == college_id)
            .filter(|e| params.course_id.is_none_or(|c| e.course_id == c))
            .filter(|e| params.status.is_none_or(|s| e.status == s))
            .filter(|e| params.exam_type.is_none_or(|t| e.exam_type == t))
            .cloned()
            .collect();
        // newest first
        exams.sort_by(|a, b| b.id.cmp(&a.id));
        let offset = params.offset() as usize;
        let limit = params.limit() as usize;
        Ok(exams.into_iter().skip(offset).take(limit).collect())
    }

    async fn update_exam(&self, college_id: i64, exam: &Exam) -> Result<Exam, AppError> {
        let mut state = self.lock();
        let current = state.exam(college_id, exam.id)?.clone();
        if current.seating_inputs_changed(exam)
            && state
                .enrollments
                .values()
                .any(|e| e.exam_id == exam.id && e.status == EnrollmentStatus::Seated)
        {
            return Err(AppError::Conflict(
                "exam schedule cannot change while students are seated; release the allocation first"
                    .to_string(),
            ));
        }
        let mut record = exam.clone();
        record.updated_at = Some(Utc::now());
        state.exams.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_exam(&self, college_id: i64, exam_id: i64) -> Result<(), AppError> {
        let mut state = self.lock();
        state.exam(college_id, exam_id)?;
        let progressed = state.enrollments.values().any(|e| {
            e.exam_id == exam_id
                && matches!(e.status, EnrollmentStatus::Seated | EnrollmentStatus::Absent)
        });
        let has_results = state.results.values().any(|r| r.exam_id == exam_id);
        if progressed || has_results {
            return Err(AppError::Conflict(format!(
                "exam {} has allocations or results and cannot be deleted",
                exam_id
            )));
        }
        state.exams.remove(&exam_id);
        state.enrollments.retain(|_, e| e.exam_id != exam_id);
        state.bookings.retain(|_, b| b.exam_id != exam_id);
        Ok(())
    }

    async fn transition_exam(
        &self,
        college_id: i64,
        exam_id: i64,
        to: ExamStatus,
    ) -> Result<Exam, AppError> {
        let mut state = self.lock();
        let current = state.exam(college_id, exam_id)?.status;
        if !current.can_transition_to(to) {
            return Err(AppError::Conflict(format!(
                "exam {} cannot move from {} to {}",
                exam_id, current, to
            )));
        }
        if to == ExamStatus::Cancelled {
            state.bookings.retain(|_, b| b.exam_id != exam_id);
            let now = Utc::now();
            for enrollment in state.enrollments.values_mut() {
                if enrollment.exam_id == exam_id
                    && enrollment.status != EnrollmentStatus::Cancelled
                {
                    enrollment.status = EnrollmentStatus::Cancelled;
                    enrollment.updated_at = Some(now);
                }
            }
        }
        let exam = state.exams.get_mut(&exam_id).expect("checked above");
        exam.status = to;
        exam.updated_at = Some(Utc::now());
        Ok(exam.clone())
    }

    async fn has_seated_enrollments(
        &self,
        college_id: i64,
        exam_id: i64,
    ) -> Result<bool, AppError> {
        let state = self.lock();
        state.exam(college_id, exam_id)?;
        Ok(state
            .enrollments
            .values()
            .any(|e| e.exam_id == exam_id && e.status == EnrollmentStatus::Seated))
    }

    async fn enroll_student(
        &self,
        college_id: i64,
        exam_id: i64,
        student_id: i64,
    ) -> Result<(ExamEnrollment, EnrollOutcomeKind), AppError> {
        let mut state = self.lock();
        let status = state.exam(college_id, exam_id)?.status;
        // The handler checks this too, but the status can flip between its
        // read and this write; the store is where the rule holds.
        if status != ExamStatus::Scheduled {
            return Err(AppError::Conflict(format!(
                "exam {} is {} and no longer open for enrollment",
                exam_id, status
            )));
        }

        let existing = state
            .enrollments
            .values()
            .find(|e| e.exam_id == exam_id && e.student_id == student_id)
            .map(|e| e.id);
        if let Some(id) = existing {
            let enrollment = state.enrollments.get_mut(&id).expect("checked above");
            if enrollment.status == EnrollmentStatus::Cancelled {
                enrollment.status = EnrollmentStatus::Enrolled;
                enrollment.seat_number = None;
                enrollment.room_id = None;
                enrollment.question_paper_set = None;
                enrollment.updated_at = Some(Utc::now());
                return Ok((enrollment.clone(), EnrollOutcomeKind::Reactivated));
            }
            return Ok((enrollment.clone(), EnrollOutcomeKind::AlreadyEnrolled));
        }

        let id = state.alloc_id();
        let now = Utc::now();
        let enrollment = ExamEnrollment {
            id,
            exam_id,
            student_id,
            college_id,
            status: EnrollmentStatus::Enrolled,
            seat_number: None,
            room_id: None,
            question_paper_set: None,
            enrolled_at: Some(now),
            updated_at: Some(now),
        };
        state.enrollments.insert(id, enrollment.clone());
        Ok((enrollment, EnrollOutcomeKind::Enrolled))
    }

    async fn get_enrollment(
        &self,
        college_id: i64,
        enrollment_id: i64,
    ) -> Result<ExamEnrollment, AppError> {
        let state = self.lock();
        state
            .enrollments
            .get(&enrollment_id)
            .filter(|e| e.college_id == college_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("enrollment {} not found", enrollment_id)))
    }

    async fn find_enrollment(
        &self,
        college_id: i64,
        exam_id: i64,
        student_id: i64,
    ) -> Result<Option<ExamEnrollment>, AppError> {
        let state = self.lock();
        Ok(state
            .enrollments
            .values()
            .find(|e| {
                e.college_id == college_id && e.exam_id == exam_id && e.student_id == student_id
            })
            .cloned())
    }

    async fn list_enrollments(
        &self,
        college_id: i64,
        exam_id: i64,
    ) -> Result<Vec<ExamEnrollment>, AppError> {
        let state = self.lock();
        state.exam(college_id, exam_id)?;
        Ok(state
            .enrollments
            .values()
            .filter(|e| e.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn student_enrollments(
        &self,
        college_id: i64,
        student_id: i64,
    ) -> Result<Vec<ExamEnrollment>, AppError> {
        let state = self.lock();
        Ok(state
            .enrollments
            .values()
            .filter(|e| e.college_id == college_id && e.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn update_enrollment_status(
        &self,
        college_id: i64,
        enrollment_id: i64,
        to: EnrollmentStatus,
    ) -> Result<ExamEnrollment, AppError> {
        let mut state = self.lock();
        let enrollment = state
            .enrollments
            .get_mut(&enrollment_id)
            .filter(|e| e.college_id == college_id)
            .ok_or_else(|| AppError::NotFound(format!("enrollment {} not found", enrollment_id)))?;
        if !enrollment.status.can_transition_to(to) {
            return Err(AppError::Conflict(format!(
                "enrollment {} cannot move from {} to {}",
                enrollment_id, enrollment.status, to
            )));
        }
        enrollment.status = to;
        enrollment.updated_at = Some(Utc::now());
        Ok(enrollment.clone())
    }

    async fn delete_enrollment(
        &self,
        college_id: i64,
        enrollment_id: i64,
    ) -> Result<(), AppError> {
        let mut state = self.lock();
        let status = state
            .enrollments
            .get(&enrollment_id)
            .filter(|e| e.college_id == college_id)
            .map(|e| e.status)
            .ok_or_else(|| AppError::NotFound(format!("enrollment {} not found", enrollment_id)))?;
        match status {
            EnrollmentStatus::Enrolled => {
                state.enrollments.remove(&enrollment_id);
            }
            EnrollmentStatus::Cancelled => {}
            // seated or absent rows carry allocation history
            _ => {
                let enrollment = state.enrollments.get_mut(&enrollment_id).expect("checked");
                enrollment.status = EnrollmentStatus::Cancelled;
                enrollment.updated_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn create_room(&self, college_id: i64, room: NewRoom) -> Result<ExamRoom, AppError> {
        let mut state = self.lock();
        if state
            .rooms
            .values()
            .any(|r| r.college_id == college_id && r.name == room.name)
        {
            return Err(AppError::Conflict(format!(
                "room '{}' already exists",
                room.name
            )));
        }
        let id = state.alloc_id();
        let record = ExamRoom {
            id,
            college_id,
            name: room.name,
            capacity: room.capacity,
            is_active: room.is_active,
            created_at: Some(Utc::now()),
        };
        state.rooms.insert(id, record.clone());
        Ok(record)
    }

    async fn get_room(&self, college_id: i64, room_id: i64) -> Result<ExamRoom, AppError> {
        let state = self.lock();
        state.room(college_id, room_id).cloned()
    }

    async fn list_rooms(
        &self,
        college_id: i64,
        active: Option<bool>,
    ) -> Result<Vec<ExamRoom>, AppError> {
        let state = self.lock();
        Ok(state
            .rooms
            .values()
            .filter(|r| r.college_id == college_id)
            .filter(|r| active.is_none_or(|a| r.is_active == a))
            .cloned()
            .collect())
    }

    async fn update_room(&self, college_id: i64, room: &ExamRoom) -> Result<ExamRoom, AppError> {
        let mut state = self.lock();
        state.room(college_id, room.id)?;
        if state
            .rooms
            .values()
            .any(|r| r.college_id == college_id && r.name == room.name && r.id != room.id)
        {
            return Err(AppError::Conflict(format!(
                "room '{}' already exists",
                room.name
            )));
        }
        state.rooms.insert(room.id, room.clone());
        Ok(room.clone())
    }

    async fn delete_room(&self, college_id: i64, room_id: i64) -> Result<(), AppError> {
        let mut state = self.lock();
        state.room(college_id, room_id)?;
        if state.bookings.values().any(|b| b.room_id == room_id) {
            return Err(AppError::Conflict(format!(
                "room {} still has bookings",
                room_id
            )));
        }
        state.rooms.remove(&room_id);
        Ok(())
    }

    async fn room_bookings(
        &self,
        college_id: i64,
        room_id: i64,
    ) -> Result<Vec<RoomBooking>, AppError> {
        let state = self.lock();
        state.room(college_id, room_id)?;
        let mut bookings: Vec<RoomBooking> = state
            .bookings
            .values()
            .filter(|b| b.room_id == room_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.start_time);
        Ok(bookings)
    }

    async fn is_room_available(
        &self,
        college_id: i64,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let state = self.lock();
        state.room(college_id, room_id)?;
        Ok(state.room_is_free(room_id, None, start, end))
    }

    async fn eligible_rooms(
        &self,
        college_id: i64,
        exam_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ExamRoom>, AppError> {
        let state = self.lock();
        Ok(state
            .rooms
            .values()
            .filter(|r| r.college_id == college_id && r.is_active)
            .filter(|r| state.room_is_free(r.id, Some(exam_id), start, end))
            .cloned()
            .collect())
    }

    async fn apply_allocation(
        &self,
        college_id: i64,
        exam_id: i64,
        plan: &AllocationPlan,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut state = self.lock();
        state.exam(college_id, exam_id)?;

        // Stage everything against a fully-released view before touching
        // the maps, so a late failure writes nothing.
        for usage in &plan.rooms_used {
            let room = state.room(college_id, usage.room_id)?;
            if !room.is_active {
                return Err(AppError::Conflict(format!(
                    "room {} is no longer active",
                    usage.room_id
                )));
            }
            if !state.room_is_free(usage.room_id, Some(exam_id), start, end) {
                return Err(AppError::Conflict(format!(
                    "room {} was booked concurrently",
                    usage.room_id
                )));
            }
        }
        for assignment in &plan.assignments {
            let valid = state.enrollments.get(&assignment.enrollment_id).is_some_and(|e| {
                e.exam_id == exam_id
                    && matches!(
                        e.status,
                        EnrollmentStatus::Enrolled | EnrollmentStatus::Seated
                    )
            });
            if !valid {
                return Err(AppError::Conflict(format!(
                    "enrollment {} changed during allocation",
                    assignment.enrollment_id
                )));
            }
        }

        // Release the previous allocation of this exam.
        state.bookings.retain(|_, b| b.exam_id != exam_id);
        let now = Utc::now();
        for enrollment in state.enrollments.values_mut() {
            if enrollment.exam_id == exam_id && enrollment.status == EnrollmentStatus::Seated {
                enrollment.status = EnrollmentStatus::Enrolled;
                enrollment.seat_number = None;
                enrollment.room_id = None;
                enrollment.question_paper_set = None;
                enrollment.updated_at = Some(now);
            }
        }

        // Apply the plan.
        for usage in &plan.rooms_used {
            let id = state.alloc_id();
            state.bookings.insert(
                id,
                RoomBooking {
                    id,
                    room_id: usage.room_id,
                    exam_id,
                    college_id,
                    start_time: start,
                    end_time: end,
                },
            );
        }
        for assignment in &plan.assignments {
            let enrollment = state
                .enrollments
                .get_mut(&assignment.enrollment_id)
                .expect("validated above");
            enrollment.status = EnrollmentStatus::Seated;
            enrollment.seat_number = Some(assignment.seat_number.clone());
            enrollment.room_id = Some(assignment.room_id);
            enrollment.question_paper_set = Some(assignment.question_paper_set);
            enrollment.updated_at = Some(now);
        }
        Ok(())
    }

    async fn create_result(
        &self,
        college_id: i64,
        exam_id: i64,
        student_id: i64,
        marks_obtained: i32,
        remarks: Option<String>,
        evaluated_by: Option<i64>,
    ) -> Result<ExamResult, AppError> {
        let mut state = self.lock();
        state.exam(college_id, exam_id)?;
        let enrolled = state.enrollments.values().any(|e| {
            e.exam_id == exam_id
                && e.student_id == student_id
                && e.status != EnrollmentStatus::Cancelled
        });
        if !enrolled {
            return Err(AppError::NotFound(format!(
                "student {} is not enrolled in exam {}",
                student_id, exam_id
            )));
        }
        if state
            .results
            .values()
            .any(|r| r.exam_id == exam_id && r.student_id == student_id)
        {
            return Err(AppError::Conflict(format!(
                "result for student {} already exists",
                student_id
            )));
        }
        let id = state.alloc_id();
        let now = Utc::now();
        let result = ExamResult {
            id,
            exam_id,
            student_id,
            college_id,
            marks_obtained: Some(marks_obtained),
            remarks,
            evaluated_by,
            graded_at: Some(now),
            created_at: Some(now),
        };
        state.results.insert(id, result.clone());
        Ok(result)
    }

    async fn bulk_grade(
        &self,
        college_id: i64,
        exam_id: i64,
        entries: Vec<GradeEntry>,
        evaluated_by: Option<i64>,
    ) -> Result<Vec<ExamResult>, AppError> {
        let mut state = self.lock();
        state.exam(college_id, exam_id)?;

        // Validate the whole batch before writing anything.
        for entry in &entries {
            let enrolled = state.enrollments.values().any(|e| {
                e.exam_id == exam_id
                    && e.student_id == entry.student_id
                    && e.status != EnrollmentStatus::Cancelled
            });
            if !enrolled {
                return Err(AppError::NotFound(format!(
                    "student {} is not enrolled in exam {}",
                    entry.student_id, exam_id
                )));
            }
        }

        let now = Utc::now();
        let mut graded = Vec::with_capacity(entries.len());
        for entry in entries {
            let existing = state
                .results
                .values()
                .find(|r| r.exam_id == exam_id && r.student_id == entry.student_id)
                .map(|r| r.id);
            let id = match existing {
                Some(id) => id,
                None => state.alloc_id(),
            };
            let result = ExamResult {
                id,
                exam_id,
                student_id: entry.student_id,
                college_id,
                marks_obtained: Some(entry.marks_obtained),
                remarks: entry.remarks,
                evaluated_by,
                graded_at: Some(now),
                created_at: state
                    .results
                    .get(&id)
                    .and_then(|r| r.created_at)
                    .or(Some(now)),
            };
            state.results.insert(id, result.clone());
            graded.push(result);
        }
        Ok(graded)
    }

    async fn get_result(&self, college_id: i64, result_id: i64) -> Result<ExamResult, AppError> {
        let state = self.lock();
        state
            .results
            .get(&result_id)
            .filter(|r| r.college_id == college_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("result {} not found", result_id)))
    }

    async fn list_results(
        &self,
        college_id: i64,
        exam_id: i64,
    ) -> Result<Vec<ExamResult>, AppError> {
        let state = self.lock();
        state.exam(college_id, exam_id)?;
        Ok(state
            .results
            .values()
            .filter(|r| r.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn graded_marks(&self, college_id: i64, exam_id: i64) -> Result<Vec<i32>, AppError> {
        let state = self.lock();
        state.exam(college_id, exam_id)?;
        Ok(state
            .results
            .values()
            .filter(|r| r.exam_id == exam_id)
            .filter_map(|r| r.marks_obtained)
            .collect())
    }

    async fn create_revaluation(
        &self,
        college_id: i64,
        revaluation: NewRevaluation,
    ) -> Result<RevaluationRequest, AppError> {
        let mut state = self.lock();
        let result = state
            .results
            .get(&revaluation.exam_result_id)
            .filter(|r| r.college_id == college_id)
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "result {} not found",
                    revaluation.exam_result_id
                ))
            })?;
        let previous_marks = result.marks_obtained.ok_or_else(|| {
            AppError::Conflict(format!(
                "result {} has not been graded yet",
                result.id
            ))
        })?;
        if result.student_id != revaluation.student_id {
            return Err(AppError::NotFound(format!(
                "result {} not found",
                result.id
            )));
        }
        if state.revaluations.values().any(|r| {
            r.exam_result_id == result.id && r.status == RevaluationStatus::Pending
        }) {
            return Err(AppError::Conflict(format!(
                "result {} already has a pending revaluation request",
                result.id
            )));
        }
        let id = state.alloc_id();
        let record = RevaluationRequest {
            id,
            exam_result_id: result.id,
            exam_id: result.exam_id,
            student_id: revaluation.student_id,
            college_id,
            reason: revaluation.reason,
            previous_marks,
            revised_marks: None,
            status: RevaluationStatus::Pending,
            requested_at: Some(Utc::now()),
            resolved_by: None,
            resolved_at: None,
            comments: None,
        };
        state.revaluations.insert(id, record.clone());
        Ok(record)
    }

    async fn get_revaluation(
        &self,
        college_id: i64,
        request_id: i64,
    ) -> Result<RevaluationRequest, AppError> {
        let state = self.lock();
        state
            .revaluations
            .get(&request_id)
            .filter(|r| r.college_id == college_id)
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!("revaluation request {} not found", request_id))
            })
    }

    async fn list_revaluations(
        &self,
        college_id: i64,
        params: &RevaluationListParams,
    ) -> Result<Vec<RevaluationRequest>, AppError> {
        let state = self.lock();
        Ok(state
            .revaluations
            .values()
            .filter(|r| r.college_id == college_id)
            .filter(|r| params.status.is_none_or(|s| r.status == s))
            .filter(|r| params.exam_id.is_none_or(|e| r.exam_id == e))
            .filter(|r| params.student_id.is_none_or(|s| r.student_id == s))
            .cloned()
            .collect())
    }

    async fn resolve_revaluation(
        &self,
        college_id: i64,
        request_id: i64,
        resolved_by: Option<i64>,
        decision: RevaluationDecision,
    ) -> Result<RevaluationRequest, AppError> {
        let mut state = self.lock();
        let current = state
            .revaluations
            .get(&request_id)
            .filter(|r| r.college_id == college_id)
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!("revaluation request {} not found", request_id))
            })?;
        // Optimistic guard: only a pending request can be resolved.
        if current.status != RevaluationStatus::Pending {
            return Err(AppError::Conflict(format!(
                "revaluation request {} is already {}",
                request_id, current.status
            )));
        }
        let now = Utc::now();
        let mut request = current;
        match decision {
            RevaluationDecision::Approve {
                revised_marks,
                comments,
            } => {
                request.status = RevaluationStatus::Approved;
                request.revised_marks = Some(revised_marks);
                request.comments = comments;
                request.resolved_by = resolved_by;
                request.resolved_at = Some(now);
                let result = state
                    .results
                    .get_mut(&request.exam_result_id)
                    .ok_or_else(|| AppError::Store("revaluation lost its result".to_string()))?;
                result.marks_obtained = Some(revised_marks);
                result.evaluated_by = resolved_by;
                result.graded_at = Some(now);
            }
            RevaluationDecision::Reject { comments } => {
                request.status = RevaluationStatus::Rejected;
                request.comments = Some(comments);
                request.resolved_by = resolved_by;
                request.resolved_at = Some(now);
            }
        }
        state.revaluations.insert(request_id, request.clone());
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam::ExamType;
    use crate::seating::{RoomUsage, SeatAssignment};
    use chrono::TimeZone;

    fn new_exam() -> NewExam {
        NewExam {
            course_id: 10,
            title: "Algorithms Midterm".to_string(),
            exam_type: ExamType::Midterm,
            start_time: Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap(),
            duration_minutes: 180,
            total_marks: 100,
            passing_marks: 50,
            question_paper_set_count: 2,
            created_by: 1,
        }
    }

    /// One exam with student 101 enrolled and seated in a fresh room.
    async fn seated_exam(store: &MemoryExamStore) -> i64 {
        let exam = store.create_exam(1, new_exam()).await.unwrap();
        let (enrollment, _) = store.enroll_student(1, exam.id, 101).await.unwrap();
        let room = store
            .create_room(
                1,
                NewRoom {
                    name: "Hall A".to_string(),
                    capacity: 10,
                    is_active: true,
                },
            )
            .await
            .unwrap();
        let plan = AllocationPlan {
            assignments: vec![SeatAssignment {
                enrollment_id: enrollment.id,
                student_id: 101,
                room_id: room.id,
                seat_number: "R1-001".to_string(),
                question_paper_set: 0,
            }],
            rooms_used: vec![RoomUsage {
                room_id: room.id,
                room_name: room.name.clone(),
                capacity: room.capacity,
                seats_filled: 1,
            }],
        };
        store
            .apply_allocation(1, exam.id, &plan, exam.start_time, exam.end_time)
            .await
            .unwrap();
        exam.id
    }

    #[tokio::test]
    async fn enrolling_into_a_cancelled_exam_is_refused_at_the_store() {
        let store = MemoryExamStore::new();
        let exam = store.create_exam(1, new_exam()).await.unwrap();
        store
            .transition_exam(1, exam.id, ExamStatus::Cancelled)
            .await
            .unwrap();

        let err = store.enroll_student(1, exam.id, 101).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        // The cancelled exam ends with zero live enrollments.
        assert!(store.list_enrollments(1, exam.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enrollment_closes_at_the_store_once_the_exam_is_ongoing() {
        let store = MemoryExamStore::new();
        let exam = store.create_exam(1, new_exam()).await.unwrap();
        store
            .transition_exam(1, exam.id, ExamStatus::Ongoing)
            .await
            .unwrap();

        let err = store.enroll_student(1, exam.id, 101).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn schedule_edits_are_refused_at_the_store_while_students_are_seated() {
        let store = MemoryExamStore::new();
        let exam_id = seated_exam(&store).await;

        let mut moved = store.get_exam(1, exam_id).await.unwrap();
        moved.start_time += chrono::Duration::hours(1);
        moved.end_time += chrono::Duration::hours(1);
        let err = store.update_exam(1, &moved).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Edits that leave the seating inputs alone still go through.
        let mut retitled = store.get_exam(1, exam_id).await.unwrap();
        retitled.title = "Algorithms Midterm (hall B wing)".to_string();
        assert!(store.update_exam(1, &retitled).await.is_ok());
    }
}
