// src/models/room.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'exam_rooms' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamRoom {
    pub id: i64,
    pub college_id: i64,
    pub name: String,
    pub capacity: i32,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Represents the 'room_bookings' table in the database.
/// Rows are materialized by seat allocation and removed on release.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RoomBooking {
    pub id: i64,
    pub room_id: i64,
    pub exam_id: i64,
    pub college_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl RoomBooking {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        intervals_overlap(self.start_time, self.end_time, start, end)
    }
}

/// Half-open interval overlap test: `[a_start, a_end)` and `[b_start, b_end)`
/// collide iff `a_start < b_end && b_start < a_end`. Back-to-back intervals
/// (one ending exactly when the other starts) do not collide.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

fn default_is_active() -> bool {
    true
}

/// DTO for registering a new exam room.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(range(min = 1, max = 2000))]
    pub capacity: i32,

    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

/// DTO for partially updating a room.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoomRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[validate(range(min = 1, max = 2000))]
    pub capacity: Option<i32>,

    pub is_active: Option<bool>,
}

/// Query-string interval for the availability check.
#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomListParams {
    pub active: Option<bool>,
}

/// Response body for the availability check.
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub room_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub available: bool,
}
