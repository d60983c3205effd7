pub mod domain;
pub mod insights;
pub mod lifecycle;
pub mod ports;
pub mod reconcile;
pub mod timer;

#[cfg(test)]
mod testing;

pub use domain::{
    Book, EndSession, Mood, NewBook, NewSession, Session, SessionUpdate, User, UserCredentials,
};
pub use lifecycle::ReadingSessionService;
pub use ports::{Clock, DatabaseService, PortError, PortResult, TimerStorage};
pub use reconcile::ReconcileOutcome;
pub use timer::{elapsed_seconds, SessionTimer, TimerSnapshot, TimerState, TimerStatus};
