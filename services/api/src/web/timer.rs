//! services/api/src/web/timer.rs
//!
//! Handlers that drive the caller's reading-session timer.

use axum::{extract::State, http::StatusCode, Extension, Json};
use bookflow_core::domain::Mood;
use bookflow_core::reconcile::ReconcileOutcome;
use bookflow_core::timer::{TimerSnapshot, TimerStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::web::rest::SessionResponse;
use crate::web::state::AppState;

#[derive(Serialize, ToSchema, Debug)]
pub struct TimerResponse {
    #[schema(value_type = String, example = "running")]
    pub status: TimerStatus,
    pub session_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    /// Reading seconds so far, pauses excluded.
    pub elapsed_seconds: u64,
}

impl From<TimerSnapshot> for TimerResponse {
    fn from(snapshot: TimerSnapshot) -> Self {
        Self {
            status: snapshot.status,
            session_id: snapshot.session_id,
            book_id: snapshot.book_id,
            elapsed_seconds: snapshot.elapsed_seconds,
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
pub struct FinishSessionRequest {
    #[schema(value_type = Option<String>, example = "happy")]
    pub mood: Option<Mood>,
    pub key_insight: Option<String>,
}

#[derive(Serialize, ToSchema, Debug, PartialEq, Eq)]
pub struct ReconcileResponse {
    /// One of `in_sync`, `cleared_stale` or `adopted`.
    pub outcome: String,
    pub session_id: Option<Uuid>,
}

impl From<ReconcileOutcome> for ReconcileResponse {
    fn from(outcome: ReconcileOutcome) -> Self {
        let (name, session_id) = match outcome {
            ReconcileOutcome::InSync => ("in_sync", None),
            ReconcileOutcome::ClearedStale { session_id } => ("cleared_stale", Some(session_id)),
            ReconcileOutcome::Adopted { session_id } => ("adopted", Some(session_id)),
        };
        Self {
            outcome: name.to_string(),
            session_id,
        }
    }
}

#[utoipa::path(
    get,
    path = "/timer",
    responses((status = 200, description = "Current timer", body = TimerResponse))
)]
pub async fn get_timer_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<TimerResponse>> {
    let snapshot = state.sessions.snapshot(user_id).await?;
    Ok(Json(snapshot.into()))
}

/// Pausing an already paused timer changes nothing.
#[utoipa::path(
    post,
    path = "/timer/pause",
    responses(
        (status = 200, description = "Timer paused", body = TimerResponse),
        (status = 409, description = "No session in progress")
    )
)]
pub async fn pause_timer_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<TimerResponse>> {
    let snapshot = state.sessions.pause(user_id).await?;
    Ok(Json(snapshot.into()))
}

#[utoipa::path(
    post,
    path = "/timer/resume",
    responses(
        (status = 200, description = "Timer running", body = TimerResponse),
        (status = 409, description = "No session in progress")
    )
)]
pub async fn resume_timer_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<TimerResponse>> {
    let snapshot = state.sessions.resume(user_id).await?;
    Ok(Json(snapshot.into()))
}

/// End the timed session and credit its elapsed seconds to the book.
#[utoipa::path(
    post,
    path = "/timer/finish",
    request_body = FinishSessionRequest,
    responses(
        (status = 200, description = "Ended session", body = SessionResponse),
        (status = 409, description = "No session in progress")
    )
)]
pub async fn finish_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<FinishSessionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state
        .sessions
        .finish(user_id, req.mood, req.key_insight)
        .await?;
    Ok(Json(session.into()))
}

/// Drop the timed session without recording it.
#[utoipa::path(
    post,
    path = "/timer/abandon",
    responses(
        (status = 204, description = "Session discarded"),
        (status = 409, description = "No session in progress")
    )
)]
pub async fn abandon_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<StatusCode> {
    state.sessions.abandon(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/timer/reconcile",
    responses((status = 200, description = "What reconciliation did", body = ReconcileResponse))
)]
pub async fn reconcile_timer_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<ReconcileResponse>> {
    let outcome = state.sessions.reconcile(user_id).await?;
    Ok(Json(outcome.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::web::test_support::test_state;
    use bookflow_core::domain::{NewBook, NewSession};
    use bookflow_core::ports::PortError;

    async fn book_for(state: &Arc<AppState>, user_id: Uuid) -> Uuid {
        state
            .db
            .create_book(
                user_id,
                NewBook {
                    title: "Piranesi".to_string(),
                    author: None,
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn finish_credits_elapsed_time_without_pauses() {
        let (state, clock, _dir) = test_state();
        let user_id = Uuid::new_v4();
        let book_id = book_for(&state, user_id).await;
        state.sessions.start(user_id, book_id, None).await.unwrap();

        clock.advance_secs(10);
        let Json(paused) = pause_timer_handler(State(state.clone()), Extension(user_id))
            .await
            .unwrap();
        assert_eq!(paused.status, TimerStatus::Paused);
        assert_eq!(paused.elapsed_seconds, 10);

        clock.advance_secs(15);
        let Json(resumed) = resume_timer_handler(State(state.clone()), Extension(user_id))
            .await
            .unwrap();
        assert_eq!(resumed.status, TimerStatus::Running);
        assert_eq!(resumed.elapsed_seconds, 10);

        clock.advance_secs(5);
        let Json(ended) = finish_session_handler(
            State(state.clone()),
            Extension(user_id),
            Json(FinishSessionRequest {
                mood: Some(Mood::Neutral),
                key_insight: Some("The house is kind".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(ended.duration, Some(15));
        assert!(ended.end_time.is_some());

        let book = state.db.get_book(user_id, book_id).await.unwrap();
        assert_eq!(book.total_reading_time, 15);

        let Json(timer) = get_timer_handler(State(state.clone()), Extension(user_id))
            .await
            .unwrap();
        assert_eq!(timer.status, TimerStatus::Idle);
        assert_eq!(timer.elapsed_seconds, 0);
    }

    #[tokio::test]
    async fn pausing_without_a_session_is_rejected() {
        let (state, _, _dir) = test_state();
        let result = pause_timer_handler(State(state), Extension(Uuid::new_v4())).await;
        assert!(matches!(result, Err(ApiError::Port(PortError::InvalidState(_)))));
    }

    #[tokio::test]
    async fn abandon_removes_the_session() {
        let (state, clock, _dir) = test_state();
        let user_id = Uuid::new_v4();
        let book_id = book_for(&state, user_id).await;
        state.sessions.start(user_id, book_id, None).await.unwrap();
        clock.advance_secs(120);

        let status = abandon_session_handler(State(state.clone()), Extension(user_id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.sessions.list_sessions(user_id, None).await.unwrap().is_empty());
        let book = state.db.get_book(user_id, book_id).await.unwrap();
        assert_eq!(book.total_reading_time, 0);
    }

    #[tokio::test]
    async fn reconcile_adopts_a_session_opened_elsewhere() {
        let (state, _, _dir) = test_state();
        let user_id = Uuid::new_v4();
        let book_id = book_for(&state, user_id).await;
        let remote = state
            .db
            .create_session(
                user_id,
                NewSession {
                    book_id,
                    focus_mode: None,
                },
            )
            .await
            .unwrap();

        let Json(response) = reconcile_timer_handler(State(state.clone()), Extension(user_id))
            .await
            .unwrap();
        assert_eq!(
            response,
            ReconcileResponse {
                outcome: "adopted".to_string(),
                session_id: Some(remote.id),
            }
        );

        let Json(again) = reconcile_timer_handler(State(state.clone()), Extension(user_id))
            .await
            .unwrap();
        assert_eq!(again.outcome, "in_sync");
    }
}
