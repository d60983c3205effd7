//! Test doubles for the core ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    Book, EndSession, NewBook, NewSession, Session, SessionUpdate, User, UserCredentials,
};
use crate::ports::{Clock, DatabaseService, PortError, PortResult, TimerStorage};

pub struct FakeClock(AtomicI64);

impl FakeClock {
    pub fn at(ms: i64) -> Self {
        Self(AtomicI64::new(ms))
    }

    pub fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(PortError::Storage("disk full".to_string()))
        } else {
            Ok(())
        }
    }
}

impl TimerStorage for MemoryStorage {
    fn load(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, value: &str) -> PortResult<()> {
        self.check_writable()?;
        self.put(key, value);
        Ok(())
    }

    fn clear(&self, key: &str) -> PortResult<()> {
        self.check_writable()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Sessions and books only; auth calls are not needed by the core.
#[derive(Default)]
pub struct FakeDatabase {
    pub sessions: Mutex<Vec<Session>>,
    pub books: Mutex<Vec<Book>>,
    pub fail_end_session: AtomicBool,
}

impl FakeDatabase {
    pub fn with_book(user_id: Uuid, total_reading_time: i64) -> (Self, Uuid) {
        let db = Self::default();
        let book_id = Uuid::new_v4();
        db.books.lock().unwrap().push(Book {
            id: book_id,
            user_id,
            title: "Dune".to_string(),
            author: Some("Frank Herbert".to_string()),
            total_reading_time,
            created_at: Utc::now(),
        });
        (db, book_id)
    }

    pub fn insert_session(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Session {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            book_id,
            start_time,
            end_time,
            duration: end_time.map(|end| (end - start_time).num_seconds() as i32),
            mood: None,
            key_insight: None,
            focus_mode: None,
        };
        self.sessions.lock().unwrap().push(session.clone());
        session
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.is_active())
            .count()
    }

    pub fn book_total(&self, book_id: Uuid) -> i64 {
        self.books
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == book_id)
            .map(|b| b.total_reading_time)
            .unwrap_or_default()
    }
}

fn unsupported<T>() -> PortResult<T> {
    Err(PortError::Unexpected("not supported by FakeDatabase".to_string()))
}

#[async_trait]
impl DatabaseService for FakeDatabase {
    async fn create_user_with_email(&self, _: &str, _: &str) -> PortResult<User> {
        unsupported()
    }

    async fn get_user_by_email(&self, _: &str) -> PortResult<UserCredentials> {
        unsupported()
    }

    async fn create_auth_session(&self, _: &str, _: Uuid, _: DateTime<Utc>) -> PortResult<()> {
        unsupported()
    }

    async fn validate_auth_session(&self, _: &str) -> PortResult<Uuid> {
        unsupported()
    }

    async fn delete_auth_session(&self, _: &str) -> PortResult<()> {
        unsupported()
    }

    async fn create_book(&self, _: Uuid, _: NewBook) -> PortResult<Book> {
        unsupported()
    }

    async fn get_book(&self, user_id: Uuid, book_id: Uuid) -> PortResult<Book> {
        self.books
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == book_id && b.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))
    }

    async fn list_books(&self, _: Uuid) -> PortResult<Vec<Book>> {
        unsupported()
    }

    async fn create_session(&self, user_id: Uuid, session: NewSession) -> PortResult<Session> {
        self.get_book(user_id, session.book_id).await?;
        // Lets concurrent callers interleave, as a real round trip would.
        tokio::task::yield_now().await;
        let created = Session {
            id: Uuid::new_v4(),
            user_id,
            book_id: session.book_id,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            mood: None,
            key_insight: None,
            focus_mode: session.focus_mode,
        };
        self.sessions.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        update: SessionUpdate,
    ) -> PortResult<Session> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
        if update.mood.is_some() {
            session.mood = update.mood;
        }
        if update.key_insight.is_some() {
            session.key_insight = update.key_insight;
        }
        if update.focus_mode.is_some() {
            session.focus_mode = update.focus_mode;
        }
        Ok(session.clone())
    }

    async fn end_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        end: EndSession,
    ) -> PortResult<Session> {
        if self.fail_end_session.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        let ended = {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions
                .iter_mut()
                .find(|s| s.id == session_id && s.user_id == user_id)
                .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
            if !session.is_active() {
                return Err(PortError::Conflict(format!(
                    "Session {} has already ended",
                    session_id
                )));
            }
            session.end_time = Some(Utc::now());
            session.duration = Some(end.duration);
            session.mood = end.mood;
            session.key_insight = end.key_insight;
            session.clone()
        };
        let mut books = self.books.lock().unwrap();
        if let Some(book) = books.iter_mut().find(|b| b.id == ended.book_id) {
            book.total_reading_time += i64::from(end.duration);
        }
        Ok(ended)
    }

    async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|s| !(s.id == session_id && s.user_id == user_id));
        if sessions.len() == before {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        book_id: Option<Uuid>,
    ) -> PortResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id && book_id.map_or(true, |b| s.book_id == b))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    async fn get_active_session(&self, user_id: Uuid) -> PortResult<Option<Session>> {
        Ok(self
            .list_sessions(user_id, None)
            .await?
            .into_iter()
            .find(Session::is_active))
    }
}
