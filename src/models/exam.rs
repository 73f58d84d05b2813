// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::AppError;

/// Exam lifecycle states.
/// `completed` and `cancelled` are terminal; the transition table below is
/// enforced at the data-access layer, not just in handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamStatus {
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
}

impl ExamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamStatus::Scheduled => "scheduled",
            ExamStatus::Ongoing => "ongoing",
            ExamStatus::Completed => "completed",
            ExamStatus::Cancelled => "cancelled",
        }
    }

    /// Cancellation is only possible before the exam goes ongoing.
    pub fn can_transition_to(&self, to: ExamStatus) -> bool {
        matches!(
            (self, to),
            (ExamStatus::Scheduled, ExamStatus::Ongoing)
                | (ExamStatus::Scheduled, ExamStatus::Cancelled)
                | (ExamStatus::Ongoing, ExamStatus::Completed)
        )
    }
}

impl fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(ExamStatus::Scheduled),
            "ongoing" => Ok(ExamStatus::Ongoing),
            "completed" => Ok(ExamStatus::Completed),
            "cancelled" => Ok(ExamStatus::Cancelled),
            other => Err(format!("unknown exam status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    Midterm,
    Final,
    Quiz,
    Practical,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Midterm => "midterm",
            ExamType::Final => "final",
            ExamType::Quiz => "quiz",
            ExamType::Practical => "practical",
        }
    }
}

impl FromStr for ExamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "midterm" => Ok(ExamType::Midterm),
            "final" => Ok(ExamType::Final),
            "quiz" => Ok(ExamType::Quiz),
            "practical" => Ok(ExamType::Practical),
            other => Err(format!("unknown exam type '{}'", other)),
        }
    }
}

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub college_id: i64,
    pub course_id: i64,
    pub title: String,
    pub exam_type: ExamType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub total_marks: i32,
    pub passing_marks: i32,
    pub status: ExamStatus,

    /// Number of question-paper variants handed out during seating.
    pub question_paper_set_count: i32,

    pub created_by: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Exam {
    /// True when the fields feeding seat allocation differ between the two
    /// versions; such edits are refused once students are seated.
    pub fn seating_inputs_changed(&self, other: &Exam) -> bool {
        self.start_time != other.start_time
            || self.end_time != other.end_time
            || self.question_paper_set_count != other.question_paper_set_count
    }

    /// Applies a partial update and re-checks the record-level invariants.
    pub fn apply_update(&self, update: &UpdateExamRequest) -> Result<Exam, AppError> {
        let mut next = self.clone();
        if let Some(title) = &update.title {
            next.title = title.clone();
        }
        if let Some(exam_type) = update.exam_type {
            next.exam_type = exam_type;
        }
        if let Some(start_time) = update.start_time {
            next.start_time = start_time;
        }
        if let Some(end_time) = update.end_time {
            next.end_time = end_time;
        }
        if let Some(duration_minutes) = update.duration_minutes {
            next.duration_minutes = duration_minutes;
        }
        if let Some(total_marks) = update.total_marks {
            next.total_marks = total_marks;
        }
        if let Some(passing_marks) = update.passing_marks {
            next.passing_marks = passing_marks;
        }
        if let Some(count) = update.question_paper_set_count {
            next.question_paper_set_count = count;
        }
        check_exam_invariants(
            next.start_time,
            next.end_time,
            next.total_marks,
            next.passing_marks,
        )?;
        Ok(next)
    }
}

/// Record-level invariants shared by create and update paths.
pub fn check_exam_invariants(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    total_marks: i32,
    passing_marks: i32,
) -> Result<(), AppError> {
    if end_time <= start_time {
        return Err(AppError::Validation(
            "end_time must be after start_time".to_string(),
        ));
    }
    if passing_marks > total_marks {
        return Err(AppError::Validation(
            "passing_marks cannot exceed total_marks".to_string(),
        ));
    }
    Ok(())
}

fn default_paper_set_count() -> i32 {
    1
}

/// DTO for creating a new exam.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    pub course_id: i64,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    pub exam_type: ExamType,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i32,

    #[validate(range(min = 1, max = 1000))]
    pub total_marks: i32,

    #[validate(range(min = 0, max = 1000))]
    pub passing_marks: i32,

    #[serde(default = "default_paper_set_count")]
    #[validate(range(min = 1, max = 10))]
    pub question_paper_set_count: i32,
}

/// DTO for partially updating an exam. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    pub exam_type: Option<ExamType>,

    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: Option<i32>,

    #[validate(range(min = 1, max = 1000))]
    pub total_marks: Option<i32>,

    #[validate(range(min = 0, max = 1000))]
    pub passing_marks: Option<i32>,

    #[validate(range(min = 1, max = 10))]
    pub question_paper_set_count: Option<i32>,
}

impl UpdateExamRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.exam_type.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.duration_minutes.is_none()
            && self.total_marks.is_none()
            && self.passing_marks.is_none()
            && self.question_paper_set_count.is_none()
    }
}

/// DTO for explicit status transitions.
#[derive(Debug, Deserialize)]
pub struct UpdateExamStatusRequest {
    pub status: ExamStatus,
}

/// Query-string filters for listing exams.
#[derive(Debug, Default, Deserialize)]
pub struct ExamListParams {
    pub course_id: Option<i64>,
    pub status: Option<ExamStatus>,
    pub exam_type: Option<ExamType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ExamListParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_exam() -> Exam {
        Exam {
            id: 1,
            college_id: 1,
            course_id: 10,
            title: "Algorithms Midterm".to_string(),
            exam_type: ExamType::Midterm,
            start_time: Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap(),
            duration_minutes: 180,
            total_marks: 100,
            passing_marks: 40,
            status: ExamStatus::Scheduled,
            question_paper_set_count: 2,
            created_by: 1,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn transition_table_allows_forward_flow() {
        assert!(ExamStatus::Scheduled.can_transition_to(ExamStatus::Ongoing));
        assert!(ExamStatus::Scheduled.can_transition_to(ExamStatus::Cancelled));
        assert!(ExamStatus::Ongoing.can_transition_to(ExamStatus::Completed));
    }

    #[test]
    fn transition_table_rejects_backward_and_terminal_moves() {
        assert!(!ExamStatus::Ongoing.can_transition_to(ExamStatus::Scheduled));
        assert!(!ExamStatus::Ongoing.can_transition_to(ExamStatus::Cancelled));
        assert!(!ExamStatus::Completed.can_transition_to(ExamStatus::Ongoing));
        assert!(!ExamStatus::Cancelled.can_transition_to(ExamStatus::Scheduled));
        assert!(!ExamStatus::Scheduled.can_transition_to(ExamStatus::Scheduled));
        assert!(!ExamStatus::Scheduled.can_transition_to(ExamStatus::Completed));
    }

    #[test]
    fn apply_update_merges_and_revalidates() {
        let exam = sample_exam();
        let update = UpdateExamRequest {
            title: Some("Algorithms Final".to_string()),
            exam_type: Some(ExamType::Final),
            start_time: None,
            end_time: None,
            duration_minutes: None,
            total_marks: None,
            passing_marks: Some(50),
            question_paper_set_count: None,
        };
        let next = exam.apply_update(&update).unwrap();
        assert_eq!(next.title, "Algorithms Final");
        assert_eq!(next.passing_marks, 50);
        assert_eq!(next.duration_minutes, 180);
    }

    #[test]
    fn apply_update_rejects_inverted_time_range() {
        let exam = sample_exam();
        let update = UpdateExamRequest {
            title: None,
            exam_type: None,
            start_time: None,
            end_time: Some(Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap()),
            duration_minutes: None,
            total_marks: None,
            passing_marks: None,
            question_paper_set_count: None,
        };
        assert!(matches!(
            exam.apply_update(&update),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn apply_update_rejects_passing_above_total() {
        let exam = sample_exam();
        let update = UpdateExamRequest {
            title: None,
            exam_type: None,
            start_time: None,
            end_time: None,
            duration_minutes: None,
            total_marks: Some(50),
            passing_marks: Some(60),
            question_paper_set_count: None,
        };
        assert!(exam.apply_update(&update).is_err());
    }

    #[test]
    fn seating_inputs_changed_detects_schedule_edits() {
        let exam = sample_exam();
        let mut moved = exam.clone();
        moved.start_time += chrono::Duration::hours(1);
        assert!(exam.seating_inputs_changed(&moved));

        let mut retitled = exam.clone();
        retitled.title = "Renamed".to_string();
        assert!(!exam.seating_inputs_changed(&retitled));
    }
}
