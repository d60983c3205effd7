//! crates/bookflow_core/src/lifecycle.rs
//!
//! Coordinates the per-user session timers with the remote session records.
//!
//! The local timer and the remote row are never updated atomically. The
//! ordering below keeps the failure modes recoverable: a session is created
//! remotely before the timer starts, and ended remotely before the timer
//! stops, so a crash in between leaves an open remote row that
//! reconciliation picks up on the next load.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{EndSession, Mood, NewSession, Session, SessionUpdate};
use crate::ports::{Clock, DatabaseService, PortError, PortResult, TimerStorage};
use crate::reconcile::{reconcile_timer, ReconcileOutcome};
use crate::timer::{storage_key, SessionTimer, TimerSnapshot};

pub struct ReadingSessionService {
    db: Arc<dyn DatabaseService>,
    clock: Arc<dyn Clock>,
    storage: Arc<dyn TimerStorage>,
    timers: Mutex<HashMap<Uuid, SessionTimer>>,
    /// Users with a `start` between its checks and its timer claim.
    starting: Mutex<HashSet<Uuid>>,
}

/// A user's claim on starting a session. Released on drop.
struct StartSlot<'a> {
    starting: &'a Mutex<HashSet<Uuid>>,
    user_id: Uuid,
}

impl Drop for StartSlot<'_> {
    fn drop(&mut self) {
        if let Ok(mut starting) = self.starting.lock() {
            starting.remove(&self.user_id);
        }
    }
}

impl ReadingSessionService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        clock: Arc<dyn Clock>,
        storage: Arc<dyn TimerStorage>,
    ) -> Self {
        Self {
            db,
            clock,
            storage,
            timers: Mutex::new(HashMap::new()),
            starting: Mutex::new(HashSet::new()),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    //=====================================================================================
    // Timer-Coupled Operations
    //=====================================================================================

    /// Creates the remote session and starts timing it.
    ///
    /// Only one start per user runs at a time. If the timer cannot be started
    /// the new remote row is deleted again.
    pub async fn start(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        focus_mode: Option<bool>,
    ) -> PortResult<(Session, TimerSnapshot)> {
        self.ensure_loaded(user_id).await?;
        let _slot = self.claim_start(user_id)?;

        let session = self
            .db
            .create_session(
                user_id,
                NewSession {
                    book_id,
                    focus_mode,
                },
            )
            .await?;

        match self.start_timer(user_id, &session) {
            Ok(snapshot) => {
                info!("Reading session {} started for user {}", session.id, user_id);
                Ok((session, snapshot))
            }
            Err(e) => {
                if let Err(cleanup) = self.db.delete_session(user_id, session.id).await {
                    error!(
                        "Session {} left open after its timer failed to start: {}",
                        session.id, cleanup
                    );
                }
                Err(e)
            }
        }
    }

    pub async fn pause(&self, user_id: Uuid) -> PortResult<TimerSnapshot> {
        self.ensure_loaded(user_id).await?;
        let mut timers = self.timers()?;
        let timer = timer_for(&mut timers, user_id)?;
        timer.pause_session()?;
        Ok(timer.snapshot())
    }

    pub async fn resume(&self, user_id: Uuid) -> PortResult<TimerSnapshot> {
        self.ensure_loaded(user_id).await?;
        let mut timers = self.timers()?;
        let timer = timer_for(&mut timers, user_id)?;
        timer.resume_session()?;
        Ok(timer.snapshot())
    }

    pub async fn snapshot(&self, user_id: Uuid) -> PortResult<TimerSnapshot> {
        self.ensure_loaded(user_id).await?;
        let mut timers = self.timers()?;
        Ok(timer_for(&mut timers, user_id)?.snapshot())
    }

    /// Ends the tracked session with the timer's elapsed seconds as its
    /// duration. The timer keeps running if the remote call fails.
    pub async fn finish(
        &self,
        user_id: Uuid,
        mood: Option<Mood>,
        key_insight: Option<String>,
    ) -> PortResult<Session> {
        self.ensure_loaded(user_id).await?;
        let (session_id, elapsed) = {
            let mut timers = self.timers()?;
            let timer = timer_for(&mut timers, user_id)?;
            let session_id = timer.active_session_id().ok_or_else(no_session_in_progress)?;
            (session_id, timer.elapsed_time())
        };

        let end = EndSession {
            duration: i32::try_from(elapsed).unwrap_or(i32::MAX),
            mood,
            key_insight,
        };
        let ended = self.db.end_session(user_id, session_id, end).await?;

        self.stop_if_tracking(user_id, session_id);
        info!(
            "Reading session {} finished after {}s",
            session_id,
            ended.duration.unwrap_or_default()
        );
        Ok(ended)
    }

    /// Discards the tracked session without crediting any reading time.
    pub async fn abandon(&self, user_id: Uuid) -> PortResult<()> {
        self.ensure_loaded(user_id).await?;
        let session_id = {
            let mut timers = self.timers()?;
            timer_for(&mut timers, user_id)?
                .active_session_id()
                .ok_or_else(no_session_in_progress)?
        };
        self.delete_session(user_id, session_id).await
    }

    /// Deletes a session row. Stops the timer if it was tracking that row.
    pub async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<()> {
        self.db.delete_session(user_id, session_id).await?;
        self.stop_if_tracking(user_id, session_id);
        Ok(())
    }

    /// Re-reads the remote active session and aligns the local timer with it.
    pub async fn reconcile(&self, user_id: Uuid) -> PortResult<ReconcileOutcome> {
        let remote = self.db.get_active_session(user_id).await?;
        let mut timers = self.timers()?;
        let timer = timers
            .entry(user_id)
            .or_insert_with(|| self.load_timer(user_id));
        let outcome = reconcile_timer(timer, remote.as_ref())?;
        log_outcome(user_id, outcome);
        Ok(outcome)
    }

    //=====================================================================================
    // Plain Remote Operations
    //=====================================================================================

    pub async fn update_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        update: SessionUpdate,
    ) -> PortResult<Session> {
        self.db.update_session(user_id, session_id, update).await
    }

    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        book_id: Option<Uuid>,
    ) -> PortResult<Vec<Session>> {
        self.db.list_sessions(user_id, book_id).await
    }

    pub async fn active_session(&self, user_id: Uuid) -> PortResult<Option<Session>> {
        self.db.get_active_session(user_id).await
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    fn timers(&self) -> PortResult<MutexGuard<'_, HashMap<Uuid, SessionTimer>>> {
        self.timers
            .lock()
            .map_err(|_| PortError::Unexpected("timer registry lock poisoned".to_string()))
    }

    fn load_timer(&self, user_id: Uuid) -> SessionTimer {
        SessionTimer::load(
            storage_key(user_id),
            self.clock.clone(),
            self.storage.clone(),
        )
    }

    /// Rehydrates and reconciles a user's timer the first time it is needed.
    async fn ensure_loaded(&self, user_id: Uuid) -> PortResult<()> {
        let loaded = self.timers()?.contains_key(&user_id);
        if loaded {
            return Ok(());
        }
        self.reconcile(user_id).await.map(|_| ())
    }

    fn claim_start(&self, user_id: Uuid) -> PortResult<StartSlot<'_>> {
        let timers = self.timers()?;
        if let Some(current) = timers.get(&user_id).and_then(SessionTimer::active_session_id) {
            return Err(PortError::Conflict(format!(
                "Session {} is already in progress",
                current
            )));
        }
        let mut starting = self
            .starting
            .lock()
            .map_err(|_| PortError::Unexpected("start registry lock poisoned".to_string()))?;
        if !starting.insert(user_id) {
            return Err(PortError::Conflict(
                "A session is already being started".to_string(),
            ));
        }
        Ok(StartSlot {
            starting: &self.starting,
            user_id,
        })
    }

    fn start_timer(&self, user_id: Uuid, session: &Session) -> PortResult<TimerSnapshot> {
        let mut timers = self.timers()?;
        let timer = timer_for(&mut timers, user_id)?;
        timer.start_session(session.id, session.book_id)?;
        Ok(timer.snapshot())
    }

    /// Called after the remote row changed, so a local failure must not undo
    /// that: the timer goes idle in memory and reconciliation clears whatever
    /// is left in storage.
    fn stop_if_tracking(&self, user_id: Uuid, session_id: Uuid) {
        let mut timers = match self.timers() {
            Ok(timers) => timers,
            Err(e) => {
                error!("Could not stop the timer for session {}: {}", session_id, e);
                return;
            }
        };
        if let Some(timer) = timers.get_mut(&user_id) {
            if timer.active_session_id() == Some(session_id) {
                if let Err(e) = timer.stop_session() {
                    warn!("Persisted timer for session {} not cleared: {}", session_id, e);
                    timer.forget();
                }
            }
        }
    }
}

fn timer_for(
    timers: &mut HashMap<Uuid, SessionTimer>,
    user_id: Uuid,
) -> PortResult<&mut SessionTimer> {
    timers
        .get_mut(&user_id)
        .ok_or_else(|| PortError::Unexpected(format!("timer for user {} not loaded", user_id)))
}

fn no_session_in_progress() -> PortError {
    PortError::InvalidState("No reading session in progress".to_string())
}

fn log_outcome(user_id: Uuid, outcome: ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::InSync => {}
        ReconcileOutcome::ClearedStale { session_id } => warn!(
            "Cleared stale local timer for session {} (user {})",
            session_id, user_id
        ),
        ReconcileOutcome::Adopted { session_id } => info!(
            "Timer for user {} now tracks open session {}",
            user_id, session_id
        ),
    }
}
