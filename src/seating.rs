// src/seating.rs
//
// Pure seat-planning logic. The planner sees a snapshot of enrollments and
// eligible rooms and produces a deterministic plan; persisting the plan
// atomically is the store's job.

use serde::Serialize;

use crate::error::AppError;
use crate::models::room::ExamRoom;

/// One student awaiting a seat. Roll numbers come from the student
/// directory and drive the deterministic seating order.
#[derive(Debug, Clone)]
pub struct SeatCandidate {
    pub enrollment_id: i64,
    pub student_id: i64,
    pub roll_number: String,
}

/// One planned seat: which enrollment row gets which room, seat label and
/// question-paper set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatAssignment {
    pub enrollment_id: i64,
    pub student_id: i64,
    pub room_id: i64,
    pub seat_number: String,
    pub question_paper_set: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomUsage {
    pub room_id: i64,
    pub room_name: String,
    pub capacity: i32,
    pub seats_filled: i32,
}

/// Output of the planner: assignments in seating order plus the rooms that
/// actually received students (one booking each).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationPlan {
    pub assignments: Vec<SeatAssignment>,
    pub rooms_used: Vec<RoomUsage>,
}

/// Response body for the allocation endpoint.
#[derive(Debug, Serialize)]
pub struct AllocationSummary {
    pub exam_id: i64,
    pub students_seated: usize,
    pub question_paper_set_count: i32,
    pub rooms_used: Vec<RoomUsage>,
}

pub fn seat_label(room_ordinal: usize, seat_seq: usize) -> String {
    format!("R{}-{:03}", room_ordinal, seat_seq)
}

/// Plans seats for every candidate or fails without planning anything.
///
/// Candidates are seated in roll-number order (ties broken by student id);
/// rooms are packed largest-capacity first (ties broken by room id) so the
/// fewest rooms are booked. Within a room, seat labels are sequential and
/// the paper set cycles over `[0, paper_set_count)` by seat index, so
/// consecutive seats never share a set when two or more sets exist.
pub fn plan_allocation(
    candidates: &[SeatCandidate],
    rooms: &[ExamRoom],
    paper_set_count: i32,
) -> Result<AllocationPlan, AppError> {
    let total_capacity: i64 = rooms.iter().map(|r| r.capacity as i64).sum();
    if (candidates.len() as i64) > total_capacity {
        return Err(AppError::Capacity(format!(
            "{} students enrolled but only {} seats available across {} eligible rooms",
            candidates.len(),
            total_capacity,
            rooms.len()
        )));
    }

    let mut ordered_candidates: Vec<&SeatCandidate> = candidates.iter().collect();
    ordered_candidates.sort_by(|a, b| {
        a.roll_number
            .cmp(&b.roll_number)
            .then(a.student_id.cmp(&b.student_id))
    });

    let mut ordered_rooms: Vec<&ExamRoom> = rooms.iter().collect();
    ordered_rooms.sort_by(|a, b| b.capacity.cmp(&a.capacity).then(a.id.cmp(&b.id)));

    let mut assignments = Vec::with_capacity(ordered_candidates.len());
    let mut rooms_used = Vec::new();
    let mut remaining = ordered_candidates.as_slice();

    for room in ordered_rooms {
        if remaining.is_empty() {
            break;
        }
        let take = remaining.len().min(room.capacity as usize);
        let (batch, rest) = remaining.split_at(take);
        let room_ordinal = rooms_used.len() + 1;

        for (idx, candidate) in batch.iter().enumerate() {
            assignments.push(SeatAssignment {
                enrollment_id: candidate.enrollment_id,
                student_id: candidate.student_id,
                room_id: room.id,
                seat_number: seat_label(room_ordinal, idx + 1),
                question_paper_set: (idx as i32) % paper_set_count,
            });
        }
        rooms_used.push(RoomUsage {
            room_id: room.id,
            room_name: room.name.clone(),
            capacity: room.capacity,
            seats_filled: take as i32,
        });
        remaining = rest;
    }

    Ok(AllocationPlan {
        assignments,
        rooms_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: i64, name: &str, capacity: i32) -> ExamRoom {
        ExamRoom {
            id,
            college_id: 1,
            name: name.to_string(),
            capacity,
            is_active: true,
            created_at: None,
        }
    }

    fn candidate(enrollment_id: i64, student_id: i64, roll: &str) -> SeatCandidate {
        SeatCandidate {
            enrollment_id,
            student_id,
            roll_number: roll.to_string(),
        }
    }

    #[test]
    fn two_students_one_room_two_sets() {
        let candidates = vec![candidate(11, 101, "1"), candidate(12, 102, "2")];
        let rooms = vec![room(1, "Hall A", 2)];

        let plan = plan_allocation(&candidates, &rooms, 2).unwrap();

        assert_eq!(plan.assignments.len(), 2);
        assert_eq!(plan.assignments[0].student_id, 101);
        assert_eq!(plan.assignments[0].seat_number, "R1-001");
        assert_eq!(plan.assignments[0].question_paper_set, 0);
        assert_eq!(plan.assignments[1].student_id, 102);
        assert_eq!(plan.assignments[1].seat_number, "R1-002");
        assert_eq!(plan.assignments[1].question_paper_set, 1);
        assert_eq!(plan.rooms_used.len(), 1);
        assert_eq!(plan.rooms_used[0].seats_filled, 2);
    }

    #[test]
    fn larger_rooms_fill_first_with_id_tiebreak() {
        let candidates: Vec<SeatCandidate> = (0..5)
            .map(|i| candidate(i + 1, i + 100, &format!("{:02}", i)))
            .collect();
        // Same capacity: room 2 beats room 7 on id. Room 9 is biggest.
        let rooms = vec![room(7, "B", 2), room(9, "C", 3), room(2, "A", 2)];

        let plan = plan_allocation(&candidates, &rooms, 1).unwrap();

        assert_eq!(plan.rooms_used.len(), 2);
        assert_eq!(plan.rooms_used[0].room_id, 9);
        assert_eq!(plan.rooms_used[0].seats_filled, 3);
        assert_eq!(plan.rooms_used[1].room_id, 2);
        assert_eq!(plan.rooms_used[1].seats_filled, 2);
        // Seat labels restart per room ordinal.
        assert_eq!(plan.assignments[3].seat_number, "R2-001");
    }

    #[test]
    fn seating_order_follows_roll_then_student_id() {
        let candidates = vec![
            candidate(1, 300, "B-02"),
            candidate(2, 100, "A-01"),
            candidate(3, 50, "B-02"),
        ];
        let rooms = vec![room(1, "Hall", 10)];

        let plan = plan_allocation(&candidates, &rooms, 1).unwrap();

        let order: Vec<i64> = plan.assignments.iter().map(|a| a.student_id).collect();
        assert_eq!(order, vec![100, 50, 300]);
    }

    #[test]
    fn insufficient_capacity_plans_nothing() {
        let candidates = vec![
            candidate(1, 1, "1"),
            candidate(2, 2, "2"),
            candidate(3, 3, "3"),
        ];
        let rooms = vec![room(1, "Tiny", 2)];

        let err = plan_allocation(&candidates, &rooms, 1).unwrap_err();
        assert!(matches!(err, AppError::Capacity(_)));
    }

    #[test]
    fn no_rooms_with_candidates_is_a_capacity_error() {
        let candidates = vec![candidate(1, 1, "1")];
        let err = plan_allocation(&candidates, &[], 1).unwrap_err();
        assert!(matches!(err, AppError::Capacity(_)));
    }

    #[test]
    fn zero_candidates_yield_an_empty_plan() {
        let rooms = vec![room(1, "Hall", 30)];
        let plan = plan_allocation(&[], &rooms, 1).unwrap();
        assert!(plan.assignments.is_empty());
        assert!(plan.rooms_used.is_empty());
    }

    #[test]
    fn consecutive_seats_never_share_a_paper_set() {
        let candidates: Vec<SeatCandidate> = (0..10)
            .map(|i| candidate(i + 1, i + 1, &format!("{:02}", i)))
            .collect();
        let rooms = vec![room(1, "Hall", 10)];

        let plan = plan_allocation(&candidates, &rooms, 3).unwrap();

        for pair in plan.assignments.windows(2) {
            assert_ne!(
                pair[0].question_paper_set, pair[1].question_paper_set,
                "adjacent seats {} and {} share a set",
                pair[0].seat_number, pair[1].seat_number
            );
        }
    }

    #[test]
    fn planning_is_deterministic() {
        let candidates = vec![
            candidate(4, 40, "R-04"),
            candidate(2, 20, "R-02"),
            candidate(3, 30, "R-03"),
        ];
        let rooms = vec![room(5, "A", 2), room(6, "B", 2)];

        let first = plan_allocation(&candidates, &rooms, 2).unwrap();
        let second = plan_allocation(&candidates, &rooms, 2).unwrap();
        assert_eq!(first, second);
    }
}
