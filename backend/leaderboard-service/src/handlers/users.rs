use actix_web::{get, web, HttpResponse};
use chrono::{Duration, Utc};
use serde::Serialize;

use super::{parse_fid, AppState};
use crate::domain::{FollowEvent, TrackedUser, UserMetricSnapshot};
use crate::error::AppError;

const ACTIVITY_WINDOW_DAYS: i64 = 7;
const MAX_ACTIVITY_EVENTS: i64 = 50;

#[derive(Debug, Serialize)]
pub struct UserActivityResponse {
    pub user: TrackedUser,
    pub metrics: Vec<UserMetricSnapshot>,
    pub events: Vec<FollowEvent>,
}

/// GET /api/users/{fid}/activity
/// Last week of snapshots (oldest first) and follow events (newest first)
#[get("/api/users/{fid}/activity")]
pub async fn get_user_activity(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let fid = parse_fid(&path)?;

    let user = state
        .queries
        .tracked_user(fid)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let since = Utc::now() - Duration::days(ACTIVITY_WINDOW_DAYS);
    let metrics = state.queries.metric_history(fid, since).await?;
    let events = state
        .queries
        .events_for_target(fid, since, MAX_ACTIVITY_EVENTS)
        .await?;

    Ok(HttpResponse::Ok().json(UserActivityResponse {
        user,
        metrics,
        events,
    }))
}
