// src/store/postgres.rs
//
// `ExamStore` over PostgreSQL using the runtime query API. Multi-entity
// workflows run inside one transaction; room rows are locked with
// `SELECT ... FOR UPDATE` so the availability check and the booking insert
// are serialized per room, and revaluation resolution uses an optimistic
// `WHERE status = 'pending'` guard.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, QueryBuilder, Row};
use std::str::FromStr;

use crate::error::AppError;
use crate::models::enrollment::{EnrollOutcomeKind, EnrollmentStatus, ExamEnrollment};
use crate::models::exam::{Exam, ExamListParams, ExamStatus, ExamType};
use crate::models::result::ExamResult;
use crate::models::revaluation::{
    RevaluationDecision, RevaluationListParams, RevaluationRequest, RevaluationStatus,
};
use crate::models::room::{ExamRoom, RoomBooking};
use crate::seating::AllocationPlan;
use crate::store::{ExamStore, GradeEntry, NewExam, NewRevaluation, NewRoom};

pub struct PgExamStore {
    pool: PgPool,
}

impl PgExamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Stored status strings always come from this crate, so a parse failure
/// here means a corrupted row, not bad input.
fn parse_stored<T>(raw: &str) -> Result<T, AppError>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>().map_err(AppError::Store)
}

fn exam_from_row(row: &PgRow) -> Result<Exam, AppError> {
    Ok(Exam {
        id: row.get("id"),
        college_id: row.get("college_id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        exam_type: parse_stored::<ExamType>(row.get("exam_type"))?,
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        duration_minutes: row.get("duration_minutes"),
        total_marks: row.get("total_marks"),
        passing_marks: row.get("passing_marks"),
        status: parse_stored::<ExamStatus>(row.get("status"))?,
        question_paper_set_count: row.get("question_paper_set_count"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn enrollment_from_row(row: &PgRow) -> Result<ExamEnrollment, AppError> {
    Ok(ExamEnrollment {
        id: row.get("id"),
        exam_id: row.get("exam_id"),
        student_id: row.get("student_id"),
        college_id: row.get("college_id"),
        status: parse_stored::<EnrollmentStatus>(row.get("status"))?,
        seat_number: row.get("seat_number"),
        room_id: row.get("room_id"),
        question_paper_set: row.get("question_paper_set"),
        enrolled_at: row.get("enrolled_at"),
        updated_at: row.get("updated_at"),
    })
}

fn revaluation_from_row(row: &PgRow) -> Result<RevaluationRequest, AppError> {
    Ok(RevaluationRequest {
        id: row.get("id"),
        exam_result_id: row.get("exam_result_id"),
        exam_id: row.get("exam_id"),
        student_id: row.get("student_id"),
        college_id: row.get("college_id"),
        reason: row.get("reason"),
        previous_marks: row.get("previous_marks"),
        revised_marks: row.get("revised_marks"),
        status: parse_stored::<RevaluationStatus>(row.get("status"))?,
        requested_at: row.get("requested_at"),
        resolved_by: row.get("resolved_by"),
        resolved_at: row.get("resolved_at"),
        comments: row.get("comments"),
    })
}

const EXAM_COLUMNS: &str = "id, college_id, course_id, title, exam_type, start_time, end_time, \
     duration_minutes, total_marks, passing_marks, status, question_paper_set_count, \
     created_by, created_at, updated_at";

const ENROLLMENT_COLUMNS: &str = "id, exam_id, student_id, college_id, status, seat_number, \
     room_id, question_paper_set, enrolled_at, updated_at";

const REVALUATION_COLUMNS: &str = "id, exam_result_id, exam_id, student_id, college_id, reason, \
     previous_marks, revised_marks, status, requested_at, resolved_by, resolved_at, comments";

fn unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl ExamStore for PgExamStore {
    async fn create_exam(&self, college_id: i64, exam: NewExam) -> Result<Exam, AppError> {
        let row = sqlx::query(&format!(
            "INSERT INTO exams (college_id, course_id, title, exam_type, start_time, end_time, \
             duration_minutes, total_marks, passing_marks, status, question_paper_set_count, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'scheduled', $10, $11) \
             RETURNING {EXAM_COLUMNS}"
        ))
        .bind(college_id)
        .bind(exam.course_id)
        .bind(&exam.title)
        .bind(exam.exam_type.as_str())
        .bind(exam.start_time)
        .bind(exam.end_time)
        .bind(exam.duration_minutes)
        .bind(exam.total_marks)
        .bind(exam.passing_marks)
        .bind(exam.question_paper_set_count)
        .bind(exam.created_by)
        .fetch_one(&self.pool)
        .await?;
        exam_from_row(&row)
    }

    async fn get_exam(&self, college_id: i64, exam_id: i64) -> Result<Exam, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1 AND college_id = $2"
        ))
        .bind(exam_id)
        .bind(college_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("exam {} not found", exam_id)))?;
        exam_from_row(&row)
    }

    async fn list_exams(
        &self,
        college_id: i64,
        params: &ExamListParams,
    ) -> Result<Vec<Exam>, AppError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {EXAM_COLUMNS} FROM exams WHERE college_id = "
        ));
        qb.push_bind(college_id);
        if let Some(course_id) = params.course_id {
            qb.push(" AND course_id = ").push_bind(course_id);
        }
        if let Some(status) = params.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(exam_type) = params.exam_type {
            qb.push(" AND exam_type = ").push_bind(exam_type.as_str());
        }
        qb.push(" ORDER BY id DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(exam_from_row).collect()
    }

    async fn update_exam(&self, college_id: i64, exam: &Exam) -> Result<Exam, AppError> {
        let mut tx = self.pool.begin().await?;

        // Lock the exam so no allocation run can seat students between
        // the seated check and the write; allocation takes the same lock.
        let row = sqlx::query(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1 AND college_id = $2 FOR UPDATE"
        ))
        .bind(exam.id)
        .bind(college_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("exam {} not found", exam.id)))?;
        let current = exam_from_row(&row)?;

        if current.seating_inputs_changed(exam) {
            let seated: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM exam_enrollments \
                 WHERE exam_id = $1 AND status = 'seated')",
            )
            .bind(exam.id)
            .fetch_one(&mut *tx)
            .await?;
            if seated {
                return Err(AppError::Conflict(
                    "exam schedule cannot change while students are seated; release the allocation first"
                        .to_string(),
                ));
            }
        }

        let row = sqlx::query(&format!(
            "UPDATE exams SET course_id = $3, title = $4, exam_type = $5, start_time = $6, \
             end_time = $7, duration_minutes = $8, total_marks = $9, passing_marks = $10, \
             question_paper_set_count = $11, updated_at = NOW() \
             WHERE id = $1 AND college_id = $2 RETURNING {EXAM_COLUMNS}"
        ))
        .bind(exam.id)
        .bind(college_id)
        .bind(exam.course_id)
        .bind(&exam.title)
        .bind(exam.exam_type.as_str())
        .bind(exam.start_time)
        .bind(exam.end_time)
        .bind(exam.duration_minutes)
        .bind(exam.total_marks)
        .bind(exam.passing_marks)
        .bind(exam.question_paper_set_count)
        .fetch_one(&mut *tx)
        .await?;
        let updated = exam_from_row(&row)?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_exam(&self, college_id: i64, exam_id: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM exams WHERE id = $1 AND college_id = $2)")
                .bind(exam_id)
                .bind(college_id)
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            return Err(AppError::NotFound(format!("exam {} not found", exam_id)));
        }

        let progressed: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM exam_enrollments \
             WHERE exam_id = $1 AND status IN ('seated', 'absent')) \
             OR EXISTS(SELECT 1 FROM exam_results WHERE exam_id = $1)",
        )
        .bind(exam_id)
        .fetch_one(&mut *tx)
        .await?;
        if progressed {
            return Err(AppError::Conflict(format!(
                "exam {} has allocations or results and cannot be deleted",
                exam_id
            )));
        }

        sqlx::query("DELETE FROM room_bookings WHERE exam_id = $1")
            .bind(exam_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM exam_enrollments WHERE exam_id = $1")
            .bind(exam_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM exams WHERE id = $1 AND college_id = $2")
            .bind(exam_id)
            .bind(college_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn transition_exam(
        &self,
        college_id: i64,
        exam_id: i64,
        to: ExamStatus,
    ) -> Result<Exam, AppError> {
        let mut tx = self.pool.begin().await?;

        let raw: Option<String> = sqlx::query_scalar(
            "SELECT status FROM exams WHERE id = $1 AND college_id = $2 FOR UPDATE",
        )
        .bind(exam_id)
        .bind(college_id)
        .fetch_optional(&mut *tx)
        .await?;
        let current = parse_stored::<ExamStatus>(
            &raw.ok_or_else(|| AppError::NotFound(format!("exam {} not found", exam_id)))?,
        )?;
        if !current.can_transition_to(to) {
            return Err(AppError::Conflict(format!(
                "exam {} cannot move from {} to {}",
                exam_id, current, to
            )));
        }

        if to == ExamStatus::Cancelled {
            sqlx::query("DELETE FROM room_bookings WHERE exam_id = $1")
                .bind(exam_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "UPDATE exam_enrollments SET status = 'cancelled', updated_at = NOW() \
                 WHERE exam_id = $1 AND status <> 'cancelled'",
            )
            .bind(exam_id)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query(&format!(
            "UPDATE exams SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND college_id = $2 RETURNING {EXAM_COLUMNS}"
        ))
        .bind(exam_id)
        .bind(college_id)
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let exam = exam_from_row(&row)?;

        tx.commit().await?;
        Ok(exam)
    }

    async fn has_seated_enrollments(
        &self,
        college_id: i64,
        exam_id: i64,
    ) -> Result<bool, AppError> {
        let seated: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM exam_enrollments \
             WHERE exam_id = $1 AND college_id = $2 AND status = 'seated')",
        )
        .bind(exam_id)
        .bind(college_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(seated)
    }

    async fn enroll_student(
        &self,
        college_id: i64,
        exam_id: i64,
        student_id: i64,
    ) -> Result<(ExamEnrollment, EnrollOutcomeKind), AppError> {
        let mut tx = self.pool.begin().await?;

        // The handler checks the status too, but only this lock holds it
        // steady against a concurrent cancel or start until commit.
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT status FROM exams WHERE id = $1 AND college_id = $2 FOR UPDATE",
        )
        .bind(exam_id)
        .bind(college_id)
        .fetch_optional(&mut *tx)
        .await?;
        let status = parse_stored::<ExamStatus>(
            &raw.ok_or_else(|| AppError::NotFound(format!("exam {} not found", exam_id)))?,
        )?;
        if status != ExamStatus::Scheduled {
            return Err(AppError::Conflict(format!(
                "exam {} is {} and no longer open for enrollment",
                exam_id, status
            )));
        }

        let existing = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM exam_enrollments \
             WHERE exam_id = $1 AND student_id = $2 AND college_id = $3 FOR UPDATE"
        ))
        .bind(exam_id)
        .bind(student_id)
        .bind(college_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            let enrollment = enrollment_from_row(&row)?;
            if enrollment.status != EnrollmentStatus::Cancelled {
                tx.commit().await?;
                return Ok((enrollment, EnrollOutcomeKind::AlreadyEnrolled));
            }
            let row = sqlx::query(&format!(
                "UPDATE exam_enrollments SET status = 'enrolled', seat_number = NULL, \
                 room_id = NULL, question_paper_set = NULL, updated_at = NOW() \
                 WHERE id = $1 RETURNING {ENROLLMENT_COLUMNS}"
            ))
            .bind(enrollment.id)
            .fetch_one(&mut *tx)
            .await?;
            let reactivated = enrollment_from_row(&row)?;
            tx.commit().await?;
            return Ok((reactivated, EnrollOutcomeKind::Reactivated));
        }

        let inserted = sqlx::query(&format!(
            "INSERT INTO exam_enrollments (exam_id, student_id, college_id, status) \
             VALUES ($1, $2, $3, 'enrolled') RETURNING {ENROLLMENT_COLUMNS}"
        ))
        .bind(exam_id)
        .bind(student_id)
        .bind(college_id)
        .fetch_one(&mut *tx)
        .await;
        let row = match inserted {
            Ok(row) => row,
            // A concurrent enroll won the unique index race. Duplicate
            // enrollment is a no-op, so return the winner's row. The
            // aborted transaction cannot be reused; read from the pool.
            Err(err) if unique_violation(&err) => {
                drop(tx);
                let row = sqlx::query(&format!(
                    "SELECT {ENROLLMENT_COLUMNS} FROM exam_enrollments \
                     WHERE exam_id = $1 AND student_id = $2 AND college_id = $3"
                ))
                .bind(exam_id)
                .bind(student_id)
                .bind(college_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict(format!(
                        "student {} was enrolled concurrently",
                        student_id
                    ))
                })?;
                return Ok((enrollment_from_row(&row)?, EnrollOutcomeKind::AlreadyEnrolled));
            }
            Err(err) => return Err(err.into()),
        };
        let enrollment = enrollment_from_row(&row)?;
        tx.commit().await?;
        Ok((enrollment, EnrollOutcomeKind::Enrolled))
    }

    async fn get_enrollment(
        &self,
        college_id: i64,
        enrollment_id: i64,
    ) -> Result<ExamEnrollment, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM exam_enrollments WHERE id = $1 AND college_id = $2"
        ))
        .bind(enrollment_id)
        .bind(college_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("enrollment {} not found", enrollment_id)))?;
        enrollment_from_row(&row)
    }

    async fn find_enrollment(
        &self,
        college_id: i64,
        exam_id: i64,
        student_id: i64,
    ) -> Result<Option<ExamEnrollment>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM exam_enrollments \
             WHERE exam_id = $1 AND student_id = $2 AND college_id = $3"
        ))
        .bind(exam_id)
        .bind(student_id)
        .bind(college_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn list_enrollments(
        &self,
        college_id: i64,
        exam_id: i64,
    ) -> Result<Vec<ExamEnrollment>, AppError> {
        self.get_exam(college_id, exam_id).await?;
        let rows = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM exam_enrollments \
             WHERE exam_id = $1 AND college_id = $2 ORDER BY id"
        ))
        .bind(exam_id)
        .bind(college_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(enrollment_from_row).collect()
    }

    async fn student_enrollments(
        &self,
        college_id: i64,
        student_id: i64,
    ) -> Result<Vec<ExamEnrollment>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM exam_enrollments \
             WHERE student_id = $1 AND college_id = $2 ORDER BY id"
        ))
        .bind(student_id)
        .bind(college_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(enrollment_from_row).collect()
    }

    async fn update_enrollment_status(
        &self,
        college_id: i64,
        enrollment_id: i64,
        to: EnrollmentStatus,
    ) -> Result<ExamEnrollment, AppError> {
        let mut tx = self.pool.begin().await?;

        let raw: Option<String> = sqlx::query_scalar(
            "SELECT status FROM exam_enrollments \
             WHERE id = $1 AND college_id = $2 FOR UPDATE",
        )
        .bind(enrollment_id)
        .bind(college_id)
        .fetch_optional(&mut *tx)
        .await?;
        let current = parse_stored::<EnrollmentStatus>(&raw.ok_or_else(|| {
            AppError::NotFound(format!("enrollment {} not found", enrollment_id))
        })?)?;
        if !current.can_transition_to(to) {
            return Err(AppError::Conflict(format!(
                "enrollment {} cannot move from {} to {}",
                enrollment_id, current, to
            )));
        }

        let row = sqlx::query(&format!(
            "UPDATE exam_enrollments SET status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {ENROLLMENT_COLUMNS}"
        ))
        .bind(enrollment_id)
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let enrollment = enrollment_from_row(&row)?;

        tx.commit().await?;
        Ok(enrollment)
    }

    async fn delete_enrollment(
        &self,
        college_id: i64,
        enrollment_id: i64,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let raw: Option<String> = sqlx::query_scalar(
            "SELECT status FROM exam_enrollments \
             WHERE id = $1 AND college_id = $2 FOR UPDATE",
        )
        .bind(enrollment_id)
        .bind(college_id)
        .fetch_optional(&mut *tx)
        .await?;
        let current = parse_stored::<EnrollmentStatus>(&raw.ok_or_else(|| {
            AppError::NotFound(format!("enrollment {} not found", enrollment_id))
        })?)?;

        match current {
            EnrollmentStatus::Enrolled => {
                sqlx::query("DELETE FROM exam_enrollments WHERE id = $1")
                    .bind(enrollment_id)
                    .execute(&mut *tx)
                    .await?;
            }
            EnrollmentStatus::Cancelled => {}
            // seated or absent rows carry allocation history
            _ => {
                sqlx::query(
                    "UPDATE exam_enrollments SET status = 'cancelled', updated_at = NOW() \
                     WHERE id = $1",
                )
                .bind(enrollment_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_room(&self, college_id: i64, room: NewRoom) -> Result<ExamRoom, AppError> {
        let inserted = sqlx::query_as::<_, ExamRoom>(
            "INSERT INTO exam_rooms (college_id, name, capacity, is_active) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, college_id, name, capacity, is_active, created_at",
        )
        .bind(college_id)
        .bind(&room.name)
        .bind(room.capacity)
        .bind(room.is_active)
        .fetch_one(&self.pool)
        .await;
        match inserted {
            Ok(record) => Ok(record),
            Err(err) if unique_violation(&err) => Err(AppError::Conflict(format!(
                "room '{}' already exists",
                room.name
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_room(&self, college_id: i64, room_id: i64) -> Result<ExamRoom, AppError> {
        sqlx::query_as::<_, ExamRoom>(
            "SELECT id, college_id, name, capacity, is_active, created_at \
             FROM exam_rooms WHERE id = $1 AND college_id = $2",
        )
        .bind(room_id)
        .bind(college_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("room {} not found", room_id)))
    }

    async fn list_rooms(
        &self,
        college_id: i64,
        active: Option<bool>,
    ) -> Result<Vec<ExamRoom>, AppError> {
        let mut qb = QueryBuilder::new(
            "SELECT id, college_id, name, capacity, is_active, created_at \
             FROM exam_rooms WHERE college_id = ",
        );
        qb.push_bind(college_id);
        if let Some(active) = active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        qb.push(" ORDER BY id");
        let rooms = qb.build_query_as::<ExamRoom>().fetch_all(&self.pool).await?;
        Ok(rooms)
    }

    async fn update_room(&self, college_id: i64, room: &ExamRoom) -> Result<ExamRoom, AppError> {
        let updated = sqlx::query_as::<_, ExamRoom>(
            "UPDATE exam_rooms SET name = $3, capacity = $4, is_active = $5 \
             WHERE id = $1 AND college_id = $2 \
             RETURNING id, college_id, name, capacity, is_active, created_at",
        )
        .bind(room.id)
        .bind(college_id)
        .bind(&room.name)
        .bind(room.capacity)
        .bind(room.is_active)
        .fetch_optional(&self.pool)
        .await;
        match updated {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(AppError::NotFound(format!("room {} not found", room.id))),
            Err(err) if unique_violation(&err) => Err(AppError::Conflict(format!(
                "room '{}' already exists",
                room.name
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_room(&self, college_id: i64, room_id: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM exam_rooms WHERE id = $1 AND college_id = $2)",
        )
        .bind(room_id)
        .bind(college_id)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Err(AppError::NotFound(format!("room {} not found", room_id)));
        }

        let booked: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM room_bookings WHERE room_id = $1)")
                .bind(room_id)
                .fetch_one(&mut *tx)
                .await?;
        if booked {
            return Err(AppError::Conflict(format!(
                "room {} still has bookings",
                room_id
            )));
        }

        sqlx::query("DELETE FROM exam_rooms WHERE id = $1 AND college_id = $2")
            .bind(room_id)
            .bind(college_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn room_bookings(
        &self,
        college_id: i64,
        room_id: i64,
    ) -> Result<Vec<RoomBooking>, AppError> {
        self.get_room(college_id, room_id).await?;
        let bookings = sqlx::query_as::<_, RoomBooking>(
            "SELECT id, room_id, exam_id, college_id, start_time, end_time \
             FROM room_bookings WHERE room_id = $1 ORDER BY start_time",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn is_room_available(
        &self,
        college_id: i64,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.get_room(college_id, room_id).await?;
        // Half-open overlap: [s, e) collides iff s < end_time AND start_time < e.
        let overlapping: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM room_bookings \
             WHERE room_id = $1 AND $2 < end_time AND start_time < $3)",
        )
        .bind(room_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(!overlapping)
    }

    async fn eligible_rooms(
        &self,
        college_id: i64,
        exam_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ExamRoom>, AppError> {
        let rooms = sqlx::query_as::<_, ExamRoom>(
            "SELECT r.id, r.college_id, r.name, r.capacity, r.is_active, r.created_at \
             FROM exam_rooms r \
             WHERE r.college_id = $1 AND r.is_active = TRUE \
               AND NOT EXISTS (SELECT 1 FROM room_bookings b \
                   WHERE b.room_id = r.id AND b.exam_id <> $2 \
                     AND $3 < b.end_time AND b.start_time < $4) \
             ORDER BY r.id",
        )
        .bind(college_id)
        .bind(exam_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rooms)
    }

    async fn apply_allocation(
        &self,
        college_id: i64,
        exam_id: i64,
        plan: &AllocationPlan,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // The same exam lock update_exam takes, so schedule edits and
        // allocation runs serialize instead of racing each other.
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM exams WHERE id = $1 AND college_id = $2 FOR UPDATE")
                .bind(exam_id)
                .bind(college_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("exam {} not found", exam_id)));
        }

        // Lock the target rooms so the re-check below and the booking
        // inserts are serialized against concurrent allocation runs.
        let room_ids: Vec<i64> = plan.rooms_used.iter().map(|u| u.room_id).collect();
        let locked: Vec<(i64, bool)> = sqlx::query_as(
            "SELECT id, is_active FROM exam_rooms \
             WHERE college_id = $1 AND id = ANY($2) ORDER BY id FOR UPDATE",
        )
        .bind(college_id)
        .bind(&room_ids)
        .fetch_all(&mut *tx)
        .await?;
        if locked.len() != room_ids.len() {
            return Err(AppError::NotFound("a planned room no longer exists".to_string()));
        }
        if let Some((id, _)) = locked.iter().find(|(_, active)| !active) {
            return Err(AppError::Conflict(format!("room {} is no longer active", id)));
        }

        // Release this exam's previous allocation.
        sqlx::query("DELETE FROM room_bookings WHERE exam_id = $1")
            .bind(exam_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE exam_enrollments SET status = 'enrolled', seat_number = NULL, \
             room_id = NULL, question_paper_set = NULL, updated_at = NOW() \
             WHERE exam_id = $1 AND status = 'seated'",
        )
        .bind(exam_id)
        .execute(&mut *tx)
        .await?;

        // Re-check foreign bookings under the lock.
        for room_id in &room_ids {
            let overlapping: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM room_bookings \
                 WHERE room_id = $1 AND exam_id <> $2 \
                   AND $3 < end_time AND start_time < $4)",
            )
            .bind(room_id)
            .bind(exam_id)
            .bind(start)
            .bind(end)
            .fetch_one(&mut *tx)
            .await?;
            if overlapping {
                return Err(AppError::Conflict(format!(
                    "room {} was booked concurrently",
                    room_id
                )));
            }
        }

        for usage in &plan.rooms_used {
            sqlx::query(
                "INSERT INTO room_bookings (room_id, exam_id, college_id, start_time, end_time) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(usage.room_id)
            .bind(exam_id)
            .bind(college_id)
            .bind(start)
            .bind(end)
            .execute(&mut *tx)
            .await?;
        }

        for assignment in &plan.assignments {
            let updated = sqlx::query(
                "UPDATE exam_enrollments SET status = 'seated', seat_number = $2, \
                 room_id = $3, question_paper_set = $4, updated_at = NOW() \
                 WHERE id = $1 AND exam_id = $5 AND status = 'enrolled'",
            )
            .bind(assignment.enrollment_id)
            .bind(&assignment.seat_number)
            .bind(assignment.room_id)
            .bind(assignment.question_paper_set)
            .bind(exam_id)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() != 1 {
                return Err(AppError::Conflict(format!(
                    "enrollment {} changed during allocation",
                    assignment.enrollment_id
                )));
            }
        }

        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;

        let enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM exam_enrollments \
             WHERE exam_id = $1 AND student_id = $2 AND college_id = $3 \
               AND status <> 'cancelled')",
        )
        .bind(exam_id)
        .bind(student_id)
        .bind(college_id)
        .fetch_one(&mut *tx)
        .await?;
        if !enrolled {
            return Err(AppError::NotFound(format!(
                "student {} is not enrolled in exam {}",
                student_id, exam_id
            )));
        }

        let inserted = sqlx::query_as::<_, ExamResult>(
            "INSERT INTO exam_results \
             (exam_id, student_id, college_id, marks_obtained, remarks, evaluated_by, graded_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             RETURNING id, exam_id, student_id, college_id, marks_obtained, remarks, \
                       evaluated_by, graded_at, created_at",
        )
        .bind(exam_id)
        .bind(student_id)
        .bind(college_id)
        .bind(marks_obtained)
        .bind(&remarks)
        .bind(evaluated_by)
        .fetch_one(&mut *tx)
        .await;
        let result = match inserted {
            Ok(result) => result,
            Err(err) if unique_violation(&err) => {
                return Err(AppError::Conflict(format!(
                    "result for student {} already exists",
                    student_id
                )));
            }
            Err(err) => return Err(err.into()),
        };

        tx.commit().await?;
        Ok(result)
    }

    async fn bulk_grade(
        &self,
        college_id: i64,
        exam_id: i64,
        entries: Vec<GradeEntry>,
        evaluated_by: Option<i64>,
    ) -> Result<Vec<ExamResult>, AppError> {
        let mut tx = self.pool.begin().await?;

        for entry in &entries {
            let enrolled: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM exam_enrollments \
                 WHERE exam_id = $1 AND student_id = $2 AND college_id = $3 \
                   AND status <> 'cancelled')",
            )
            .bind(exam_id)
            .bind(entry.student_id)
            .bind(college_id)
            .fetch_one(&mut *tx)
            .await?;
            if !enrolled {
                return Err(AppError::NotFound(format!(
                    "student {} is not enrolled in exam {}",
                    entry.student_id, exam_id
                )));
            }
        }

        let mut graded = Vec::with_capacity(entries.len());
        for entry in entries {
            let result = sqlx::query_as::<_, ExamResult>(
                "INSERT INTO exam_results \
                 (exam_id, student_id, college_id, marks_obtained, remarks, evaluated_by, graded_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
                 ON CONFLICT (exam_id, student_id) DO UPDATE SET \
                   marks_obtained = EXCLUDED.marks_obtained, remarks = EXCLUDED.remarks, \
                   evaluated_by = EXCLUDED.evaluated_by, graded_at = EXCLUDED.graded_at \
                 RETURNING id, exam_id, student_id, college_id, marks_obtained, remarks, \
                           evaluated_by, graded_at, created_at",
            )
            .bind(exam_id)
            .bind(entry.student_id)
            .bind(college_id)
            .bind(entry.marks_obtained)
            .bind(&entry.remarks)
            .bind(evaluated_by)
            .fetch_one(&mut *tx)
            .await?;
            graded.push(result);
        }

        tx.commit().await?;
        Ok(graded)
    }

    async fn get_result(&self, college_id: i64, result_id: i64) -> Result<ExamResult, AppError> {
        sqlx::query_as::<_, ExamResult>(
            "SELECT id, exam_id, student_id, college_id, marks_obtained, remarks, \
                    evaluated_by, graded_at, created_at \
             FROM exam_results WHERE id = $1 AND college_id = $2",
        )
        .bind(result_id)
        .bind(college_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("result {} not found", result_id)))
    }

    async fn list_results(
        &self,
        college_id: i64,
        exam_id: i64,
    ) -> Result<Vec<ExamResult>, AppError> {
        self.get_exam(college_id, exam_id).await?;
        let results = sqlx::query_as::<_, ExamResult>(
            "SELECT id, exam_id, student_id, college_id, marks_obtained, remarks, \
                    evaluated_by, graded_at, created_at \
             FROM exam_results WHERE exam_id = $1 AND college_id = $2 ORDER BY id",
        )
        .bind(exam_id)
        .bind(college_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(results)
    }

    async fn graded_marks(&self, college_id: i64, exam_id: i64) -> Result<Vec<i32>, AppError> {
        self.get_exam(college_id, exam_id).await?;
        let marks: Vec<i32> = sqlx::query_scalar(
            "SELECT marks_obtained FROM exam_results \
             WHERE exam_id = $1 AND college_id = $2 AND marks_obtained IS NOT NULL",
        )
        .bind(exam_id)
        .bind(college_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(marks)
    }

    async fn create_revaluation(
        &self,
        college_id: i64,
        revaluation: NewRevaluation,
    ) -> Result<RevaluationRequest, AppError> {
        let mut tx = self.pool.begin().await?;

        let result: Option<(i64, i64, Option<i32>)> = sqlx::query_as(
            "SELECT exam_id, student_id, marks_obtained FROM exam_results \
             WHERE id = $1 AND college_id = $2 FOR UPDATE",
        )
        .bind(revaluation.exam_result_id)
        .bind(college_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (exam_id, result_student, marks) = result.ok_or_else(|| {
            AppError::NotFound(format!(
                "result {} not found",
                revaluation.exam_result_id
            ))
        })?;
        if result_student != revaluation.student_id {
            return Err(AppError::NotFound(format!(
                "result {} not found",
                revaluation.exam_result_id
            )));
        }
        let previous_marks = marks.ok_or_else(|| {
            AppError::Conflict(format!(
                "result {} has not been graded yet",
                revaluation.exam_result_id
            ))
        })?;

        let pending: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM revaluation_requests \
             WHERE exam_result_id = $1 AND status = 'pending')",
        )
        .bind(revaluation.exam_result_id)
        .fetch_one(&mut *tx)
        .await?;
        if pending {
            return Err(AppError::Conflict(format!(
                "result {} already has a pending revaluation request",
                revaluation.exam_result_id
            )));
        }

        let inserted = sqlx::query(&format!(
            "INSERT INTO revaluation_requests \
             (exam_result_id, exam_id, student_id, college_id, reason, previous_marks, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'pending') RETURNING {REVALUATION_COLUMNS}"
        ))
        .bind(revaluation.exam_result_id)
        .bind(exam_id)
        .bind(revaluation.student_id)
        .bind(college_id)
        .bind(&revaluation.reason)
        .bind(previous_marks)
        .fetch_one(&mut *tx)
        .await;
        let row = match inserted {
            Ok(row) => row,
            // Partial unique index backs the pending check against races.
            Err(err) if unique_violation(&err) => {
                return Err(AppError::Conflict(format!(
                    "result {} already has a pending revaluation request",
                    revaluation.exam_result_id
                )));
            }
            Err(err) => return Err(err.into()),
        };
        let request = revaluation_from_row(&row)?;

        tx.commit().await?;
        Ok(request)
    }

    async fn get_revaluation(
        &self,
        college_id: i64,
        request_id: i64,
    ) -> Result<RevaluationRequest, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {REVALUATION_COLUMNS} FROM revaluation_requests \
             WHERE id = $1 AND college_id = $2"
        ))
        .bind(request_id)
        .bind(college_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("revaluation request {} not found", request_id))
        })?;
        revaluation_from_row(&row)
    }

    async fn list_revaluations(
        &self,
        college_id: i64,
        params: &RevaluationListParams,
    ) -> Result<Vec<RevaluationRequest>, AppError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {REVALUATION_COLUMNS} FROM revaluation_requests WHERE college_id = "
        ));
        qb.push_bind(college_id);
        if let Some(status) = params.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(exam_id) = params.exam_id {
            qb.push(" AND exam_id = ").push_bind(exam_id);
        }
        if let Some(student_id) = params.student_id {
            qb.push(" AND student_id = ").push_bind(student_id);
        }
        qb.push(" ORDER BY id DESC");
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(revaluation_from_row).collect()
    }

    async fn resolve_revaluation(
        &self,
        college_id: i64,
        request_id: i64,
        resolved_by: Option<i64>,
        decision: RevaluationDecision,
    ) -> Result<RevaluationRequest, AppError> {
        let mut tx = self.pool.begin().await?;

        // Optimistic guard: the UPDATE only matches while the request is
        // still pending, so a concurrent resolver loses with zero rows.
        let resolved = match &decision {
            RevaluationDecision::Approve {
                revised_marks,
                comments,
            } => {
                sqlx::query(&format!(
                    "UPDATE revaluation_requests SET status = 'approved', revised_marks = $3, \
                     comments = $4, resolved_by = $5, resolved_at = NOW() \
                     WHERE id = $1 AND college_id = $2 AND status = 'pending' \
                     RETURNING {REVALUATION_COLUMNS}"
                ))
                .bind(request_id)
                .bind(college_id)
                .bind(revised_marks)
                .bind(comments)
                .bind(resolved_by)
                .fetch_optional(&mut *tx)
                .await?
            }
            RevaluationDecision::Reject { comments } => {
                sqlx::query(&format!(
                    "UPDATE revaluation_requests SET status = 'rejected', comments = $3, \
                     resolved_by = $4, resolved_at = NOW() \
                     WHERE id = $1 AND college_id = $2 AND status = 'pending' \
                     RETURNING {REVALUATION_COLUMNS}"
                ))
                .bind(request_id)
                .bind(college_id)
                .bind(comments)
                .bind(resolved_by)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let row = match resolved {
            Some(row) => row,
            None => {
                let status: Option<String> = sqlx::query_scalar(
                    "SELECT status FROM revaluation_requests WHERE id = $1 AND college_id = $2",
                )
                .bind(request_id)
                .bind(college_id)
                .fetch_optional(&mut *tx)
                .await?;
                return Err(match status {
                    Some(status) => AppError::Conflict(format!(
                        "revaluation request {} is already {}",
                        request_id, status
                    )),
                    None => AppError::NotFound(format!(
                        "revaluation request {} not found",
                        request_id
                    )),
                });
            }
        };
        let request = revaluation_from_row(&row)?;

        if let RevaluationDecision::Approve { revised_marks, .. } = decision {
            sqlx::query(
                "UPDATE exam_results SET marks_obtained = $2, evaluated_by = $3, graded_at = NOW() \
                 WHERE id = $1",
            )
            .bind(request.exam_result_id)
            .bind(revised_marks)
            .bind(resolved_by)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(request)
    }
}
