// src/utils/mod.rs

pub mod context;
pub mod html;
