// src/models/mod.rs

pub mod enrollment;
pub mod exam;
pub mod hall_ticket;
pub mod result;
pub mod revaluation;
pub mod room;
