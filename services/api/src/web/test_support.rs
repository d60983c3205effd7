//! Shared fixtures for handler tests.

use bookflow_core::ports::Clock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use crate::adapters::{FileTimerStorage, InMemoryDatabase};
use crate::config::Config;
use crate::web::state::AppState;

/// A clock that only moves when told to.
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn advance_secs(&self, secs: i64) {
        self.0.fetch_add(secs * 1000, Ordering::SeqCst);
    }

    pub fn set_ms(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// The returned `TempDir` holds the timer files; keep it alive for the test.
pub fn test_state() -> (Arc<AppState>, Arc<ManualClock>, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let storage = FileTimerStorage::new(dir.path()).expect("timer store should open");

    let config = Config::from_vars(|name| match name {
        "DATABASE_URL" => Some("memory:".to_string()),
        _ => None,
    })
    .expect("test config should load");

    // 2024-03-10T12:00:00Z
    let clock = Arc::new(ManualClock(AtomicI64::new(1_710_072_000_000)));
    let state = AppState::new(
        Arc::new(InMemoryDatabase::new()),
        clock.clone(),
        Arc::new(storage),
        Arc::new(config),
    );
    (Arc::new(state), clock, dir)
}
