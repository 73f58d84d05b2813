// src/models/revaluation.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Revaluation request states. `approved` and `rejected` are terminal;
/// resolution uses an optimistic status guard at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevaluationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RevaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevaluationStatus::Pending => "pending",
            RevaluationStatus::Approved => "approved",
            RevaluationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RevaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevaluationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RevaluationStatus::Pending),
            "approved" => Ok(RevaluationStatus::Approved),
            "rejected" => Ok(RevaluationStatus::Rejected),
            other => Err(format!("unknown revaluation status '{}'", other)),
        }
    }
}

/// Represents the 'revaluation_requests' table in the database.
/// References its exam result but does not own it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevaluationRequest {
    pub id: i64,
    pub exam_result_id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub college_id: i64,
    pub reason: String,

    /// Marks at the time the request was filed.
    pub previous_marks: i32,

    /// Set on approval; null while pending or when rejected.
    pub revised_marks: Option<i32>,

    pub status: RevaluationStatus,
    pub requested_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<i64>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub comments: Option<String>,
}

/// DTO for filing a revaluation request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRevaluationRequest {
    pub exam_result_id: i64,

    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
}

/// DTO for approving a request. The marks ceiling is the exam's total marks
/// and is checked in the handler.
#[derive(Debug, Deserialize, Validate)]
pub struct ApproveRevaluationRequest {
    #[validate(range(min = 0))]
    pub revised_marks: i32,

    #[validate(length(max = 2000))]
    pub comments: Option<String>,
}

/// DTO for rejecting a request.
#[derive(Debug, Deserialize, Validate)]
pub struct RejectRevaluationRequest {
    #[validate(length(min = 1, max = 2000))]
    pub comments: String,
}

/// Resolution outcome carried into the store layer.
#[derive(Debug, Clone)]
pub enum RevaluationDecision {
    Approve {
        revised_marks: i32,
        comments: Option<String>,
    },
    Reject {
        comments: String,
    },
}

/// Query-string filters for listing revaluation requests.
#[derive(Debug, Default, Deserialize)]
pub struct RevaluationListParams {
    pub status: Option<RevaluationStatus>,
    pub exam_id: Option<i64>,
    pub student_id: Option<i64>,
}
