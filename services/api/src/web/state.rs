//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use bookflow_core::lifecycle::ReadingSessionService;
use bookflow_core::ports::{Clock, DatabaseService, TimerStorage};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub sessions: Arc<ReadingSessionService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        clock: Arc<dyn Clock>,
        timer_storage: Arc<dyn TimerStorage>,
        config: Arc<Config>,
    ) -> Self {
        let sessions = Arc::new(ReadingSessionService::new(
            db.clone(),
            clock,
            timer_storage,
        ));
        Self {
            db,
            sessions,
            config,
        }
    }
}
