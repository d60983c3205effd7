//! services/api/src/web/stats.rs
//!
//! Reading insights computed over the caller's session history.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use bookflow_core::insights::{heatmap, reading_stats};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::state::AppState;

const DEFAULT_HEATMAP_DAYS: u32 = 84;
const MAX_HEATMAP_DAYS: u32 = 366;

#[derive(Serialize, ToSchema, Debug)]
pub struct StatsResponse {
    pub total_sessions: usize,
    pub total_seconds: i64,
    pub average_session_seconds: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct HeatmapCellResponse {
    pub date: NaiveDate,
    pub seconds: i64,
    /// 0 to 4.
    pub level: u8,
}

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct HeatmapQuery {
    /// Number of days ending today, 1 to 366. Defaults to 84.
    pub days: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "Reading summary", body = StatsResponse))
)]
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<StatsResponse>> {
    let sessions = state.sessions.list_sessions(user_id, None).await?;
    let today = state.sessions.clock().now().date_naive();
    let stats = reading_stats(&sessions, today);
    Ok(Json(StatsResponse {
        total_sessions: stats.total_sessions,
        total_seconds: stats.total_seconds,
        average_session_seconds: stats.average_session_seconds,
        current_streak: stats.streak.current,
        longest_streak: stats.streak.longest,
    }))
}

#[utoipa::path(
    get,
    path = "/stats/heatmap",
    params(HeatmapQuery),
    responses(
        (status = 200, description = "One cell per day, oldest first", body = [HeatmapCellResponse]),
        (status = 400, description = "Day count out of range")
    )
)]
pub async fn heatmap_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<HeatmapQuery>,
) -> ApiResult<Json<Vec<HeatmapCellResponse>>> {
    let days = query.days.unwrap_or(DEFAULT_HEATMAP_DAYS);
    if days == 0 || days > MAX_HEATMAP_DAYS {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {}",
            MAX_HEATMAP_DAYS
        )));
    }
    let sessions = state.sessions.list_sessions(user_id, None).await?;
    let today = state.sessions.clock().now().date_naive();
    let cells = heatmap(&sessions, today, days)
        .into_iter()
        .map(|cell| HeatmapCellResponse {
            date: cell.date,
            seconds: cell.seconds,
            level: cell.level,
        })
        .collect();
    Ok(Json(cells))
}
