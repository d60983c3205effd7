//! crates/bookflow_core/src/timer.rs
//!
//! The reading-session timer: the persisted `TimerState` record, the pure
//! elapsed-time calculation over it, and `SessionTimer`, which owns one state
//! and drives the Idle/Running/Paused transitions.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ports::{Clock, PortError, PortResult, TimerStorage};

/// Fixed storage name for persisted timer state.
pub const TIMER_STORAGE_NAME: &str = "bookflow-reading-session";

/// The storage key under which a user's timer state is persisted.
pub fn storage_key(user_id: Uuid) -> String {
    format!("{}:{}", TIMER_STORAGE_NAME, user_id)
}

//=========================================================================================
// Timer State
//=========================================================================================

/// The persisted timer record. All timestamps are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub active_session_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    pub start_time: Option<i64>,
    pub is_paused: bool,
    pub paused_duration: i64,
    pub paused_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

impl TimerState {
    pub fn status(&self) -> TimerStatus {
        match (self.active_session_id, self.is_paused) {
            (None, _) => TimerStatus::Idle,
            (Some(_), true) => TimerStatus::Paused,
            (Some(_), false) => TimerStatus::Running,
        }
    }

    /// Paused implies a pause timestamp; idle implies every field is reset.
    pub fn is_consistent(&self) -> bool {
        if self.is_paused && self.paused_at.is_none() {
            return false;
        }
        match self.active_session_id {
            None => *self == TimerState::default(),
            Some(_) => self.start_time.is_some() && self.paused_duration >= 0,
        }
    }
}

/// Whole seconds of reading time in `state` as of `now_ms`.
///
/// While paused the pause timestamp stands in for `now_ms`, so the value is
/// frozen until the session resumes.
pub fn elapsed_seconds(state: &TimerState, now_ms: i64) -> u64 {
    let Some(start) = state.start_time else {
        return 0;
    };
    let reference = match (state.is_paused, state.paused_at) {
        (true, Some(paused_at)) => paused_at,
        _ => now_ms,
    };
    let running_ms = reference
        .saturating_sub(start)
        .saturating_sub(state.paused_duration);
    if running_ms <= 0 {
        0
    } else {
        (running_ms / 1000) as u64
    }
}

/// What the UI polls to render the running counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub session_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    pub elapsed_seconds: u64,
}

//=========================================================================================
// Session Timer
//=========================================================================================

/// Owns one user's timer state and writes it through to `TimerStorage` on
/// every transition.
pub struct SessionTimer {
    key: String,
    state: TimerState,
    clock: Arc<dyn Clock>,
    storage: Arc<dyn TimerStorage>,
}

impl SessionTimer {
    /// Rehydrates the timer stored under `key`. A missing, unreadable or
    /// inconsistent entry yields an idle timer.
    pub fn load(key: String, clock: Arc<dyn Clock>, storage: Arc<dyn TimerStorage>) -> Self {
        let state = match storage.load(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<TimerState>(&raw) {
                Ok(state) if state.is_consistent() => state,
                Ok(_) => {
                    warn!("Discarding inconsistent timer state stored under {}", key);
                    TimerState::default()
                }
                Err(e) => {
                    warn!("Discarding unreadable timer state under {}: {}", key, e);
                    TimerState::default()
                }
            },
            Ok(None) => TimerState::default(),
            Err(e) => {
                warn!("Failed to load timer state under {}: {}", key, e);
                TimerState::default()
            }
        };
        Self {
            key,
            state,
            clock,
            storage,
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn status(&self) -> TimerStatus {
        self.state.status()
    }

    pub fn active_session_id(&self) -> Option<Uuid> {
        self.state.active_session_id
    }

    /// Begins tracking a session that already exists remotely.
    ///
    /// Fails with `Conflict` if another session is being tracked; the caller
    /// must finish or abandon it first.
    pub fn start_session(&mut self, session_id: Uuid, book_id: Uuid) -> PortResult<()> {
        if let Some(current) = self.state.active_session_id {
            return Err(PortError::Conflict(format!(
                "Session {} is already in progress",
                current
            )));
        }
        let now = self.clock.now_ms();
        self.commit(TimerState {
            active_session_id: Some(session_id),
            book_id: Some(book_id),
            start_time: Some(now),
            ..TimerState::default()
        })?;
        debug!("Timer started for session {}", session_id);
        Ok(())
    }

    /// Tracks `session_id` from an externally known start time, replacing
    /// whatever was tracked before.
    pub fn adopt(&mut self, session_id: Uuid, book_id: Uuid, start_ms: i64) -> PortResult<()> {
        self.commit(TimerState {
            active_session_id: Some(session_id),
            book_id: Some(book_id),
            start_time: Some(start_ms),
            ..TimerState::default()
        })
    }

    /// Freezes the timer. Pausing an already paused timer keeps the original
    /// pause timestamp.
    pub fn pause_session(&mut self) -> PortResult<()> {
        match self.status() {
            TimerStatus::Idle => Err(PortError::InvalidState(
                "No reading session in progress".to_string(),
            )),
            TimerStatus::Paused => Ok(()),
            TimerStatus::Running => {
                let next = TimerState {
                    is_paused: true,
                    paused_at: Some(self.clock.now_ms()),
                    ..self.state.clone()
                };
                self.commit(next)
            }
        }
    }

    /// Folds the pause into `paused_duration`. No-op while running.
    pub fn resume_session(&mut self) -> PortResult<()> {
        match self.status() {
            TimerStatus::Idle => Err(PortError::InvalidState(
                "No reading session in progress".to_string(),
            )),
            TimerStatus::Running => Ok(()),
            TimerStatus::Paused => {
                let paused_for = self
                    .state
                    .paused_at
                    .map(|at| self.clock.now_ms().saturating_sub(at).max(0))
                    .unwrap_or(0);
                let next = TimerState {
                    is_paused: false,
                    paused_at: None,
                    paused_duration: self.state.paused_duration + paused_for,
                    ..self.state.clone()
                };
                self.commit(next)
            }
        }
    }

    /// Resets to idle. Only local state is touched.
    pub fn stop_session(&mut self) -> PortResult<()> {
        self.commit(TimerState::default())
    }

    /// Drops the in-memory state without touching storage. Whatever is still
    /// persisted is cleared by reconciliation on the next load.
    pub fn forget(&mut self) {
        self.state = TimerState::default();
    }

    pub fn elapsed_time(&self) -> u64 {
        elapsed_seconds(&self.state, self.clock.now_ms())
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            status: self.status(),
            session_id: self.state.active_session_id,
            book_id: self.state.book_id,
            elapsed_seconds: self.elapsed_time(),
        }
    }

    // Persist first so a storage failure leaves the in-memory state untouched.
    fn commit(&mut self, next: TimerState) -> PortResult<()> {
        if next.active_session_id.is_none() {
            self.storage.clear(&self.key)?;
        } else {
            let raw = serde_json::to_string(&next)
                .map_err(|e| PortError::Storage(e.to_string()))?;
            self.storage.save(&self.key, &raw)?;
        }
        self.state = next;
        Ok(())
    }
}
