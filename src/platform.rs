// src/platform.rs
//
// Narrow interfaces to the rest of the institution platform. The exam
// subsystem never manages colleges, students or courses; it only resolves
// them. Audit persistence and notification delivery are likewise someone
// else's job behind a trait.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct College {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: i64,
    pub college_id: i64,
    pub name: String,
    pub roll_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: i64,
    pub college_id: i64,
    pub code: String,
    pub title: String,
}

/// Read-only lookups against the platform's master data.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn resolve_college(&self, college_id: i64) -> Result<College, AppError>;
    async fn get_student(&self, college_id: i64, student_id: i64) -> Result<Student, AppError>;
    async fn get_course(&self, college_id: i64, course_id: i64) -> Result<Course, AppError>;
}

/// One auditable business event. The platform decides where these land.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub college_id: i64,
    pub actor_id: Option<i64>,
    pub action: &'static str,
    pub entity: String,
    pub detail: serde_json::Value,
}

/// Audit delivery must never fail the operation being audited, so the
/// trait is infallible; implementations swallow and log their own errors.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub college_id: i64,
    pub student_id: i64,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification);
}

/// Reads master tables owned by the platform. This service only ever
/// SELECTs from them.
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn resolve_college(&self, college_id: i64) -> Result<College, AppError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM colleges WHERE id = $1")
                .bind(college_id)
                .fetch_optional(&self.pool)
                .await?;
        let (id, name) =
            row.ok_or_else(|| AppError::NotFound(format!("college {} not found", college_id)))?;
        Ok(College { id, name })
    }

    async fn get_student(&self, college_id: i64, student_id: i64) -> Result<Student, AppError> {
        let row: Option<(i64, i64, String, String)> = sqlx::query_as(
            "SELECT id, college_id, name, roll_number FROM students \
             WHERE id = $1 AND college_id = $2",
        )
        .bind(student_id)
        .bind(college_id)
        .fetch_optional(&self.pool)
        .await?;
        let (id, college_id, name, roll_number) =
            row.ok_or_else(|| AppError::NotFound(format!("student {} not found", student_id)))?;
        Ok(Student {
            id,
            college_id,
            name,
            roll_number,
        })
    }

    async fn get_course(&self, college_id: i64, course_id: i64) -> Result<Course, AppError> {
        let row: Option<(i64, i64, String, String)> = sqlx::query_as(
            "SELECT id, college_id, code, title FROM courses \
             WHERE id = $1 AND college_id = $2",
        )
        .bind(course_id)
        .bind(college_id)
        .fetch_optional(&self.pool)
        .await?;
        let (id, college_id, code, title) =
            row.ok_or_else(|| AppError::NotFound(format!("course {} not found", course_id)))?;
        Ok(Course {
            id,
            college_id,
            code,
            title,
        })
    }
}

/// In-memory directory for tests and database-less runs.
#[derive(Default)]
pub struct MemoryDirectory {
    inner: Mutex<MemoryDirectoryState>,
}

#[derive(Default)]
struct MemoryDirectoryState {
    colleges: HashMap<i64, College>,
    students: HashMap<i64, Student>,
    courses: HashMap<i64, Course>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_college(&self, college: College) {
        let mut state = self.inner.lock().expect("directory mutex poisoned");
        state.colleges.insert(college.id, college);
    }

    pub fn add_student(&self, student: Student) {
        let mut state = self.inner.lock().expect("directory mutex poisoned");
        state.students.insert(student.id, student);
    }

    pub fn add_course(&self, course: Course) {
        let mut state = self.inner.lock().expect("directory mutex poisoned");
        state.courses.insert(course.id, course);
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn resolve_college(&self, college_id: i64) -> Result<College, AppError> {
        let state = self.inner.lock().expect("directory mutex poisoned");
        state
            .colleges
            .get(&college_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("college {} not found", college_id)))
    }

    async fn get_student(&self, college_id: i64, student_id: i64) -> Result<Student, AppError> {
        let state = self.inner.lock().expect("directory mutex poisoned");
        state
            .students
            .get(&student_id)
            .filter(|s| s.college_id == college_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("student {} not found", student_id)))
    }

    async fn get_course(&self, college_id: i64, course_id: i64) -> Result<Course, AppError> {
        let state = self.inner.lock().expect("directory mutex poisoned");
        state
            .courses
            .get(&course_id)
            .filter(|c| c.college_id == college_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("course {} not found", course_id)))
    }
}

/// Emits audit events through tracing; the platform's collector picks the
/// structured records up from there.
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, event: AuditEvent) {
        tracing::info!(
            college_id = event.college_id,
            actor_id = event.actor_id,
            action = event.action,
            entity = %event.entity,
            detail = %event.detail,
            "audit"
        );
    }
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) {
        tracing::info!(
            college_id = notification.college_id,
            student_id = notification.student_id,
            subject = %notification.subject,
            "notification queued"
        );
    }
}

/// Captures notifications so tests can assert on delivery.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, notification: Notification) {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
    }
}
