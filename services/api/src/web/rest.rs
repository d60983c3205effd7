//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the book and reading-session REST endpoints
//! and the master definition for the OpenAPI specification.

use crate::error::{ApiError, ApiResult};
use crate::web::state::AppState;
use crate::web::{auth, stats, timer};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use bookflow_core::domain::{Book, Mood, NewBook, Session, SessionUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        create_book_handler,
        list_books_handler,
        get_book_handler,
        start_session_handler,
        list_sessions_handler,
        active_session_handler,
        update_session_handler,
        delete_session_handler,
        timer::get_timer_handler,
        timer::pause_timer_handler,
        timer::resume_timer_handler,
        timer::finish_session_handler,
        timer::abandon_session_handler,
        timer::reconcile_timer_handler,
        stats::stats_handler,
        stats::heatmap_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            CreateBookRequest,
            BookResponse,
            StartSessionRequest,
            StartSessionResponse,
            UpdateSessionRequest,
            SessionResponse,
            timer::TimerResponse,
            timer::FinishSessionRequest,
            timer::ReconcileResponse,
            stats::StatsResponse,
            stats::HeatmapCellResponse,
        )
    ),
    tags(
        (name = "BookFlow API", description = "Book catalog, reading sessions, the session timer and reading insights.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: Option<String>,
    /// Seconds of reading credited from ended sessions.
    pub total_reading_time: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            total_reading_time: book.total_reading_time,
            created_at: book.created_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct SessionResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<i32>,
    #[schema(value_type = Option<String>, example = "happy")]
    pub mood: Option<Mood>,
    pub key_insight: Option<String>,
    pub focus_mode: Option<bool>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            book_id: session.book_id,
            start_time: session.start_time,
            end_time: session.end_time,
            duration: session.duration,
            mood: session.mood,
            key_insight: session.key_insight,
            focus_mode: session.focus_mode,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct StartSessionRequest {
    pub book_id: Uuid,
    pub focus_mode: Option<bool>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct StartSessionResponse {
    pub session: SessionResponse,
    pub timer: timer::TimerResponse,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct UpdateSessionRequest {
    #[schema(value_type = Option<String>, example = "neutral")]
    pub mood: Option<Mood>,
    pub key_insight: Option<String>,
    pub focus_mode: Option<bool>,
}

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct ListSessionsQuery {
    /// Only sessions for this book.
    pub book_id: Option<Uuid>,
}

//=========================================================================================
// Book Handlers
//=========================================================================================

/// Add a book to the catalog.
#[utoipa::path(
    post,
    path = "/books",
    request_body = CreateBookRequest,
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Missing title"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn create_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateBookRequest>,
) -> ApiResult<(StatusCode, Json<BookResponse>)> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("A book needs a title".to_string()));
    }
    let book = state
        .db
        .create_book(
            user_id,
            NewBook {
                title: title.to_string(),
                author: req.author.filter(|a| !a.trim().is_empty()),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(book.into())))
}

/// List the user's books, newest first.
#[utoipa::path(
    get,
    path = "/books",
    responses(
        (status = 200, description = "The catalog", body = [BookResponse]),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_books_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Vec<BookResponse>>> {
    let books = state.db.list_books(user_id).await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/books/{book_id}",
    params(("book_id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book", body = BookResponse),
        (status = 404, description = "No such book")
    )
)]
pub async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(book_id): Path<Uuid>,
) -> ApiResult<Json<BookResponse>> {
    let book = state.db.get_book(user_id, book_id).await?;
    Ok(Json(book.into()))
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// Start a reading session and its timer.
///
/// Fails with 409 while another session is in progress.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Session started", body = StartSessionResponse),
        (status = 404, description = "No such book"),
        (status = 409, description = "A session is already in progress")
    )
)]
pub async fn start_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<StartSessionRequest>,
) -> ApiResult<(StatusCode, Json<StartSessionResponse>)> {
    let (session, snapshot) = state
        .sessions
        .start(user_id, req.book_id, req.focus_mode)
        .await?;
    let response = StartSessionResponse {
        session: session.into(),
        timer: snapshot.into(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// List sessions, most recent first.
#[utoipa::path(
    get,
    path = "/sessions",
    params(ListSessionsQuery),
    responses(
        (status = 200, description = "Session history", body = [SessionResponse])
    )
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let sessions = state.sessions.list_sessions(user_id, query.book_id).await?;
    Ok(Json(sessions.into_iter().map(SessionResponse::from).collect()))
}

/// The session without an end time, if any.
#[utoipa::path(
    get,
    path = "/sessions/active",
    responses(
        (status = 200, description = "The open session or null", body = Option<SessionResponse>)
    )
)]
pub async fn active_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Option<SessionResponse>>> {
    let active = state.sessions.active_session(user_id).await?;
    Ok(Json(active.map(SessionResponse::from)))
}

#[utoipa::path(
    patch,
    path = "/sessions/{session_id}",
    params(("session_id" = Uuid, Path, description = "Session id")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Updated session", body = SessionResponse),
        (status = 400, description = "Nothing to update"),
        (status = 404, description = "No such session")
    )
)]
pub async fn update_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<UpdateSessionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let update = SessionUpdate {
        mood: req.mood,
        key_insight: req.key_insight,
        focus_mode: req.focus_mode,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }
    let session = state
        .sessions
        .update_session(user_id, session_id, update)
        .await?;
    Ok(Json(session.into()))
}

/// Delete a session. The timer stops if it was tracking it.
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    params(("session_id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such session")
    )
)]
pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.sessions.delete_session(user_id, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
