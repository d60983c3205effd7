//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use bookflow_core::domain::{
    Book, EndSession, Mood, NewBook, NewSession, Session, SessionUpdate, User, UserCredentials,
};
use bookflow_core::ports::{DatabaseService, PortError, PortResult};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

const SESSION_COLUMNS: &str =
    "id, user_id, book_id, start_time, end_time, duration, mood, key_insight, focus_mode";

const BOOK_COLUMNS: &str = "id, user_id, title, author, total_reading_time, created_at";

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct BookRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    author: Option<String>,
    total_reading_time: i64,
    created_at: DateTime<Utc>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            author: self.author,
            total_reading_time: self.total_reading_time,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    user_id: Uuid,
    book_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    duration: Option<i32>,
    mood: Option<String>,
    key_insight: Option<String>,
    focus_mode: Option<bool>,
}
impl SessionRecord {
    fn to_domain(self) -> Session {
        // The CHECK constraint keeps unknown moods out; an old row is logged, not fatal.
        let mood = self.mood.and_then(|raw| match raw.parse::<Mood>() {
            Ok(mood) => Some(mood),
            Err(e) => {
                warn!("Ignoring mood on session {}: {}", self.id, e);
                None
            }
        });
        Session {
            id: self.id,
            user_id: self.user_id,
            book_id: self.book_id,
            start_time: self.start_time,
            end_time: self.end_time,
            duration: self.duration,
            mood,
            key_insight: self.key_insight,
            focus_mode: self.focus_mode,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) RETURNING user_id",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Conflict(format!("Email {} is already registered", email))
            }
            _ => unexpected(e),
        })?;

        Ok(User {
            user_id,
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))?;

        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_auth_session(
        &self,
        auth_session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(auth_session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, auth_session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(auth_session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, auth_session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(auth_session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_book(&self, user_id: Uuid, book: NewBook) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(&format!(
            "INSERT INTO books (id, user_id, title, author) VALUES ($1, $2, $3, $4) RETURNING {}",
            BOOK_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(book.title)
        .bind(book.author)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_book(&self, user_id: Uuid, book_id: Uuid) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {} FROM books WHERE id = $1 AND user_id = $2",
            BOOK_COLUMNS
        ))
        .bind(book_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))?;
        Ok(record.to_domain())
    }

    async fn list_books(&self, user_id: Uuid) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {} FROM books WHERE user_id = $1 ORDER BY created_at DESC",
            BOOK_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_session(&self, user_id: Uuid, session: NewSession) -> PortResult<Session> {
        // Selecting from `books` both checks ownership and lets the row default start_time.
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO reading_sessions (id, user_id, book_id, focus_mode) \
             SELECT $1, b.user_id, b.id, $4 FROM books b WHERE b.id = $3 AND b.user_id = $2 \
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(session.book_id)
        .bind(session.focus_mode)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Book {} not found", session.book_id)))?;
        Ok(record.to_domain())
    }

    async fn update_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        update: SessionUpdate,
    ) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "UPDATE reading_sessions SET \
                mood = COALESCE($1, mood), \
                key_insight = COALESCE($2, key_insight), \
                focus_mode = COALESCE($3, focus_mode) \
             WHERE id = $4 AND user_id = $5 RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(update.mood.map(|m| m.as_str()))
        .bind(update.key_insight)
        .bind(update.focus_mode)
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
        Ok(record.to_domain())
    }

    async fn end_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        end: EndSession,
    ) -> PortResult<Session> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let ended = sqlx::query_as::<_, SessionRecord>(&format!(
            "UPDATE reading_sessions SET \
                end_time = now(), \
                duration = $1, \
                mood = COALESCE($2, mood), \
                key_insight = COALESCE($3, key_insight) \
             WHERE id = $4 AND user_id = $5 AND end_time IS NULL RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(end.duration)
        .bind(end.mood.map(|m| m.as_str()))
        .bind(end.key_insight)
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;

        let Some(ended) = ended else {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM reading_sessions WHERE id = $1 AND user_id = $2)",
            )
            .bind(session_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;
            return Err(if exists {
                PortError::Conflict(format!("Session {} has already ended", session_id))
            } else {
                PortError::NotFound(format!("Session {} not found", session_id))
            });
        };

        // A single increment statement, so concurrent completions cannot lose updates.
        sqlx::query(
            "UPDATE books SET total_reading_time = total_reading_time + $1 WHERE id = $2",
        )
        .bind(i64::from(end.duration))
        .bind(ended.book_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(ended.to_domain())
    }

    async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM reading_sessions WHERE id = $1 AND user_id = $2")
            .bind(session_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        book_id: Option<Uuid>,
    ) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM reading_sessions \
             WHERE user_id = $1 AND ($2::uuid IS NULL OR book_id = $2) \
             ORDER BY start_time DESC",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(book_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_active_session(&self, user_id: Uuid) -> PortResult<Option<Session>> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM reading_sessions \
             WHERE user_id = $1 AND end_time IS NULL \
             ORDER BY start_time DESC LIMIT 1",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }
}
