// src/handlers/mod.rs

pub mod allocation;
pub mod enrollments;
pub mod exams;
pub mod hall_tickets;
pub mod results;
pub mod revaluations;
pub mod rooms;

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use crate::config::Config;
use crate::error::AppError;

/// Caller-supplied deadline for long write operations, in milliseconds.
/// Clamped to the configured ceiling.
#[derive(Debug, Default, Deserialize)]
pub struct TimeoutParams {
    pub timeout_ms: Option<u64>,
}

/// Runs a store operation under a deadline. An elapsed deadline drops the
/// future, which rolls any open transaction back whole.
pub(crate) async fn with_deadline<T, F>(
    config: &Config,
    requested: Option<u64>,
    fut: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    let ms = config.op_timeout_ms(requested);
    match tokio::time::timeout(Duration::from_millis(ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Store(format!(
            "operation exceeded its {}ms deadline",
            ms
        ))),
    }
}
