use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::platform::{AuditSink, Directory, Notifier};
use crate::store::ExamStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ExamStore>,
    pub directory: Arc<dyn Directory>,
    pub audit: Arc<dyn AuditSink>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Config,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
