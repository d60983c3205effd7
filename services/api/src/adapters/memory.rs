//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. It follows the
//! same ownership and ordering rules as the PostgreSQL adapter and backs
//! `DATABASE_URL=memory:` as well as the service's tests.

use async_trait::async_trait;
use bookflow_core::domain::{
    Book, EndSession, NewBook, NewSession, Session, SessionUpdate, User, UserCredentials,
};
use bookflow_core::ports::{DatabaseService, PortError, PortResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: Vec<UserCredentials>,
    auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    books: Vec<Book>,
    sessions: Vec<Session>,
}

#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory database lock poisoned".to_string()))
    }
}

fn session_not_found(session_id: Uuid) -> PortError {
    PortError::NotFound(format!("Session {} not found", session_id))
}

fn book_not_found(book_id: Uuid) -> PortError {
    PortError::NotFound(format!("Book {} not found", book_id))
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut tables = self.tables()?;
        if tables.users.iter().any(|u| u.email == email) {
            return Err(PortError::Conflict(format!("Email {} is already registered", email)));
        }
        let user_id = Uuid::new_v4();
        tables.users.push(UserCredentials {
            user_id,
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(User {
            user_id,
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.tables()?
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        auth_session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables()?
            .auth_sessions
            .insert(auth_session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, auth_session_id: &str) -> PortResult<Uuid> {
        match self.tables()?.auth_sessions.get(auth_session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, auth_session_id: &str) -> PortResult<()> {
        self.tables()?.auth_sessions.remove(auth_session_id);
        Ok(())
    }

    async fn create_book(&self, user_id: Uuid, book: NewBook) -> PortResult<Book> {
        let created = Book {
            id: Uuid::new_v4(),
            user_id,
            title: book.title,
            author: book.author,
            total_reading_time: 0,
            created_at: Utc::now(),
        };
        self.tables()?.books.push(created.clone());
        Ok(created)
    }

    async fn get_book(&self, user_id: Uuid, book_id: Uuid) -> PortResult<Book> {
        self.tables()?
            .books
            .iter()
            .find(|b| b.id == book_id && b.user_id == user_id)
            .cloned()
            .ok_or_else(|| book_not_found(book_id))
    }

    async fn list_books(&self, user_id: Uuid) -> PortResult<Vec<Book>> {
        let mut books: Vec<Book> = self
            .tables()?
            .books
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(books)
    }

    async fn create_session(&self, user_id: Uuid, session: NewSession) -> PortResult<Session> {
        let mut tables = self.tables()?;
        if !tables
            .books
            .iter()
            .any(|b| b.id == session.book_id && b.user_id == user_id)
        {
            return Err(book_not_found(session.book_id));
        }
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
        tables.sessions.push(created.clone());
        Ok(created)
    }

    async fn update_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        update: SessionUpdate,
    ) -> PortResult<Session> {
        let mut tables = self.tables()?;
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.user_id == user_id)
            .ok_or_else(|| session_not_found(session_id))?;
        if let Some(mood) = update.mood {
            session.mood = Some(mood);
        }
        if let Some(key_insight) = update.key_insight {
            session.key_insight = Some(key_insight);
        }
        if let Some(focus_mode) = update.focus_mode {
            session.focus_mode = Some(focus_mode);
        }
        Ok(session.clone())
    }

    async fn end_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        end: EndSession,
    ) -> PortResult<Session> {
        // One lock covers both rows, the in-memory analogue of a transaction.
        let mut tables = self.tables()?;
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.user_id == user_id)
            .ok_or_else(|| session_not_found(session_id))?;
        if !session.is_active() {
            return Err(PortError::Conflict(format!(
                "Session {} has already ended",
                session_id
            )));
        }
        session.end_time = Some(Utc::now());
        session.duration = Some(end.duration);
        if end.mood.is_some() {
            session.mood = end.mood;
        }
        if end.key_insight.is_some() {
            session.key_insight = end.key_insight;
        }
        let ended = session.clone();

        if let Some(book) = tables.books.iter_mut().find(|b| b.id == ended.book_id) {
            book.total_reading_time += i64::from(end.duration);
        }
        Ok(ended)
    }

    async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables()?;
        let before = tables.sessions.len();
        tables
            .sessions
            .retain(|s| !(s.id == session_id && s.user_id == user_id));
        if tables.sessions.len() == before {
            return Err(session_not_found(session_id));
        }
        Ok(())
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        book_id: Option<Uuid>,
    ) -> PortResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .tables()?
            .sessions
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

#[cfg(test)]
mod tests {
    use super::*;
    use bookflow_core::domain::Mood;

    async fn seeded() -> (InMemoryDatabase, Uuid, Book) {
        let db = InMemoryDatabase::new();
        let user = db
            .create_user_with_email("reader@example.com", "hash")
            .await
            .unwrap();
        let book = db
            .create_book(
                user.user_id,
                NewBook {
                    title: "Middlemarch".to_string(),
                    author: Some("George Eliot".to_string()),
                },
            )
            .await
            .unwrap();
        (db, user.user_id, book)
    }

    fn set_total(db: &InMemoryDatabase, book_id: Uuid, total: i64) {
        let mut tables = db.tables().unwrap();
        let book = tables.books.iter_mut().find(|b| b.id == book_id).unwrap();
        book.total_reading_time = total;
    }

    #[tokio::test]
    async fn end_session_increments_book_reading_time() {
        let (db, user_id, book) = seeded().await;
        set_total(&db, book.id, 1200);
        let session = db
            .create_session(
                user_id,
                NewSession {
                    book_id: book.id,
                    focus_mode: None,
                },
            )
            .await
            .unwrap();

        let ended = db
            .end_session(
                user_id,
                session.id,
                EndSession {
                    duration: 600,
                    mood: Some(Mood::Neutral),
                    key_insight: None,
                },
            )
            .await
            .unwrap();

        assert!(ended.end_time.is_some());
        assert_eq!(ended.duration, Some(600));
        assert_eq!(
            db.get_book(user_id, book.id).await.unwrap().total_reading_time,
            1800
        );
    }

    #[tokio::test]
    async fn ending_twice_is_a_conflict_and_credits_once() {
        let (db, user_id, book) = seeded().await;
        let session = db
            .create_session(
                user_id,
                NewSession {
                    book_id: book.id,
                    focus_mode: Some(true),
                },
            )
            .await
            .unwrap();
        let end = EndSession {
            duration: 60,
            mood: None,
            key_insight: None,
        };

        db.end_session(user_id, session.id, end.clone()).await.unwrap();
        assert!(matches!(
            db.end_session(user_id, session.id, end).await,
            Err(PortError::Conflict(_))
        ));
        assert_eq!(
            db.get_book(user_id, book.id).await.unwrap().total_reading_time,
            60
        );
    }

    #[tokio::test]
    async fn active_session_is_the_one_without_end_time() {
        let (db, user_id, book) = seeded().await;
        let new_session = || NewSession {
            book_id: book.id,
            focus_mode: None,
        };
        let finished = db.create_session(user_id, new_session()).await.unwrap();
        db.end_session(
            user_id,
            finished.id,
            EndSession {
                duration: 30,
                mood: None,
                key_insight: None,
            },
        )
        .await
        .unwrap();
        let open = db.create_session(user_id, new_session()).await.unwrap();

        let active = db.get_active_session(user_id).await.unwrap();
        assert_eq!(active.map(|s| s.id), Some(open.id));
    }

    #[tokio::test]
    async fn sessions_are_scoped_to_their_owner() {
        let (db, user_id, book) = seeded().await;
        let stranger = Uuid::new_v4();

        assert!(matches!(
            db.create_session(
                stranger,
                NewSession {
                    book_id: book.id,
                    focus_mode: None
                }
            )
            .await,
            Err(PortError::NotFound(_))
        ));

        let session = db
            .create_session(
                user_id,
                NewSession {
                    book_id: book.id,
                    focus_mode: None,
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            db.delete_session(stranger, session.id).await,
            Err(PortError::NotFound(_))
        ));
        assert!(db.list_sessions(stranger, None).await.unwrap().is_empty());
        assert!(db.get_active_session(stranger).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_sessions_filters_by_book_newest_first() {
        let (db, user_id, book) = seeded().await;
        let other = db
            .create_book(
                user_id,
                NewBook {
                    title: "Persuasion".to_string(),
                    author: None,
                },
            )
            .await
            .unwrap();
        for book_id in [book.id, other.id, book.id] {
            db.create_session(
                user_id,
                NewSession {
                    book_id,
                    focus_mode: None,
                },
            )
            .await
            .unwrap();
        }

        let all = db.list_sessions(user_id, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].start_time >= w[1].start_time));

        let filtered = db.list_sessions(user_id, Some(book.id)).await.unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|s| s.book_id == book.id));
    }

    #[tokio::test]
    async fn update_only_touches_given_fields() {
        let (db, user_id, book) = seeded().await;
        let session = db
            .create_session(
                user_id,
                NewSession {
                    book_id: book.id,
                    focus_mode: Some(true),
                },
            )
            .await
            .unwrap();

        let updated = db
            .update_session(
                user_id,
                session.id,
                SessionUpdate {
                    key_insight: Some("Characters are shaped by small choices".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.focus_mode, Some(true));
        assert!(updated.key_insight.is_some());
        assert_eq!(updated.mood, None);
    }

    #[tokio::test]
    async fn auth_sessions_expire() {
        let db = InMemoryDatabase::new();
        let user = db.create_user_with_email("a@b.c", "hash").await.unwrap();
        db.create_auth_session("live", user.user_id, Utc::now() + chrono::Duration::days(1))
            .await
            .unwrap();
        db.create_auth_session("dead", user.user_id, Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();

        assert_eq!(db.validate_auth_session("live").await.unwrap(), user.user_id);
        assert!(matches!(
            db.validate_auth_session("dead").await,
            Err(PortError::Unauthorized)
        ));
        assert!(matches!(
            db.create_user_with_email("a@b.c", "other").await,
            Err(PortError::Conflict(_))
        ));
    }
}
