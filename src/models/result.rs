// src/models/result.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use validator::Validate;

/// Represents the 'exam_results' table in the database.
/// `marks_obtained` stays null until the row is graded.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub college_id: i64,
    pub marks_obtained: Option<i32>,
    pub remarks: Option<String>,
    pub evaluated_by: Option<i64>,
    pub graded_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ExamResult {
    pub fn is_graded(&self) -> bool {
        self.marks_obtained.is_some()
    }
}

/// DTO for recording a single result.
/// The marks ceiling depends on the exam and is checked in the handler.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateResultRequest {
    pub student_id: i64,

    #[validate(range(min = 0))]
    pub marks_obtained: i32,

    #[validate(length(max = 2000))]
    pub remarks: Option<String>,
}

/// One entry of a bulk grading call.
#[derive(Debug, Deserialize, Validate)]
pub struct ResultEntry {
    #[validate(range(min = 0))]
    pub marks_obtained: i32,

    #[validate(length(max = 2000))]
    pub remarks: Option<String>,
}

/// DTO for bulk grading.
/// Keys arrive as JSON strings and deserialize into student ids.
#[derive(Debug, Deserialize)]
pub struct BulkGradeRequest {
    pub results: HashMap<i64, ResultEntry>,
}

/// Aggregate statistics over the graded results of one exam.
/// All aggregates are null when nothing has been graded yet.
#[derive(Debug, Serialize, PartialEq)]
pub struct ResultStats {
    pub exam_id: i64,
    pub graded_count: usize,
    pub mean: Option<f64>,
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub pass_rate: Option<f64>,
}

impl ResultStats {
    pub fn from_marks(exam_id: i64, marks: &[i32], passing_marks: i32) -> Self {
        if marks.is_empty() {
            return ResultStats {
                exam_id,
                graded_count: 0,
                mean: None,
                min: None,
                max: None,
                pass_rate: None,
            };
        }
        let count = marks.len();
        let sum: i64 = marks.iter().map(|m| *m as i64).sum();
        let passed = marks.iter().filter(|m| **m >= passing_marks).count();
        ResultStats {
            exam_id,
            graded_count: count,
            mean: Some(sum as f64 / count as f64),
            min: marks.iter().min().copied(),
            max: marks.iter().max().copied(),
            pass_rate: Some(passed as f64 / count as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_over_three_results() {
        let stats = ResultStats::from_marks(1, &[40, 60, 80], 50);
        assert_eq!(stats.graded_count, 3);
        assert_eq!(stats.mean, Some(60.0));
        assert_eq!(stats.min, Some(40));
        assert_eq!(stats.max, Some(80));
        assert_eq!(stats.pass_rate, Some(2.0 / 3.0));
    }

    #[test]
    fn stats_with_zero_graded_results_are_undefined() {
        let stats = ResultStats::from_marks(1, &[], 50);
        assert_eq!(stats.graded_count, 0);
        assert_eq!(stats.mean, None);
        assert_eq!(stats.min, None);
        assert_eq!(stats.max, None);
        assert_eq!(stats.pass_rate, None);
    }

    #[test]
    fn pass_boundary_is_inclusive() {
        let stats = ResultStats::from_marks(1, &[50], 50);
        assert_eq!(stats.pass_rate, Some(1.0));
    }
}
