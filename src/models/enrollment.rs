// src/models/enrollment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Per-student enrollment states.
/// `seated` is only ever set by seat allocation; the public update endpoint
/// drives attendance marking and withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Enrolled,
    Seated,
    Absent,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "enrolled",
            EnrollmentStatus::Seated => "seated",
            EnrollmentStatus::Absent => "absent",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }

    /// Transition table for operator-driven updates. Seat assignment and
    /// release move rows between `enrolled` and `seated` internally and do
    /// not pass through this check.
    pub fn can_transition_to(&self, to: EnrollmentStatus) -> bool {
        matches!(
            (self, to),
            (EnrollmentStatus::Enrolled, EnrollmentStatus::Cancelled)
                | (EnrollmentStatus::Seated, EnrollmentStatus::Absent)
                | (EnrollmentStatus::Seated, EnrollmentStatus::Cancelled)
        )
    }

    /// Active rows count toward the one-per-student uniqueness rule.
    pub fn is_active(&self) -> bool {
        !matches!(self, EnrollmentStatus::Cancelled)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enrolled" => Ok(EnrollmentStatus::Enrolled),
            "seated" => Ok(EnrollmentStatus::Seated),
            "absent" => Ok(EnrollmentStatus::Absent),
            "cancelled" => Ok(EnrollmentStatus::Cancelled),
            other => Err(format!("unknown enrollment status '{}'", other)),
        }
    }
}

/// Represents the 'exam_enrollments' table in the database.
/// Seat fields stay null until allocation runs and are cleared on release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamEnrollment {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub college_id: i64,
    pub status: EnrollmentStatus,
    pub seat_number: Option<String>,
    pub room_id: Option<i64>,
    pub question_paper_set: Option<i32>,
    pub enrolled_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// DTO for enrolling a single student.
#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub student_id: i64,
}

/// DTO for bulk enrollment.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkEnrollRequest {
    #[validate(length(min = 1, max = 500))]
    pub student_ids: Vec<i64>,
}

/// Per-student outcome of a bulk enrollment call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollOutcomeKind {
    Enrolled,
    AlreadyEnrolled,
    Reactivated,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct EnrollOutcome {
    pub student_id: i64,
    pub outcome: EnrollOutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// DTO for operator-driven enrollment status updates.
#[derive(Debug, Deserialize)]
pub struct UpdateEnrollmentRequest {
    pub status: EnrollmentStatus,
}
