//! crates/bookflow_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the hosted database, the local timer storage and the
//! wall clock.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::{
    Book, EndSession, NewBook, NewSession, Session, SessionUpdate, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, disk).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The hosted relational backend. Every data operation is scoped to the
/// authenticated user; rows owned by someone else are reported as `NotFound`.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        auth_session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, auth_session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, auth_session_id: &str) -> PortResult<()>;

    // --- Book Catalog ---
    async fn create_book(&self, user_id: Uuid, book: NewBook) -> PortResult<Book>;

    async fn get_book(&self, user_id: Uuid, book_id: Uuid) -> PortResult<Book>;

    async fn list_books(&self, user_id: Uuid) -> PortResult<Vec<Book>>;

    // --- Reading Sessions ---
    /// Inserts a session whose `start_time` is generated by the backend.
    async fn create_session(&self, user_id: Uuid, session: NewSession) -> PortResult<Session>;

    async fn update_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        update: SessionUpdate,
    ) -> PortResult<Session>;

    /// Closes the session and adds `end.duration` to the book's
    /// `total_reading_time` as one atomic increment.
    async fn end_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        end: EndSession,
    ) -> PortResult<Session>;

    async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<()>;

    /// Most recent first.
    async fn list_sessions(&self, user_id: Uuid, book_id: Option<Uuid>)
        -> PortResult<Vec<Session>>;

    async fn get_active_session(&self, user_id: Uuid) -> PortResult<Option<Session>>;
}

/// Durable key/value text storage for the local timer state.
pub trait TimerStorage: Send + Sync {
    fn load(&self, key: &str) -> PortResult<Option<String>>;

    fn save(&self, key: &str, value: &str) -> PortResult<()>;

    fn clear(&self, key: &str) -> PortResult<()>;
}

/// Wall-clock source, injectable so timer tests can control time.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;

    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.now_ms())
            .single()
            .unwrap_or_default()
    }
}
