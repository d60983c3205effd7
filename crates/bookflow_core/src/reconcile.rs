//! crates/bookflow_core/src/reconcile.rs
//!
//! Brings a rehydrated local timer in line with the remote active-session
//! record. The remote record is authoritative.

use uuid::Uuid;

use crate::domain::Session;
use crate::ports::PortResult;
use crate::timer::SessionTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Local and remote agree.
    InSync,
    /// The local timer claimed a session the backend no longer has open.
    ClearedStale { session_id: Uuid },
    /// The local timer now tracks the backend's open session.
    Adopted { session_id: Uuid },
}

pub fn reconcile_timer(
    timer: &mut SessionTimer,
    remote_active: Option<&Session>,
) -> PortResult<ReconcileOutcome> {
    match (timer.active_session_id(), remote_active) {
        (None, None) => Ok(ReconcileOutcome::InSync),
        (Some(local), Some(remote)) if local == remote.id => Ok(ReconcileOutcome::InSync),
        (Some(local), None) => {
            timer.stop_session()?;
            Ok(ReconcileOutcome::ClearedStale { session_id: local })
        }
        (_, Some(remote)) => {
            timer.adopt(remote.id, remote.book_id, remote.start_time.timestamp_millis())?;
            Ok(ReconcileOutcome::Adopted {
                session_id: remote.id,
            })
        }
    }
}
