use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};

use super::{AppState, Pagination};
use crate::domain::{Fid, FollowEvent};
use crate::error::AppError;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct FollowEventsQuery {
    pub fid: Option<Fid>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct FollowEventsResponse {
    pub data: Vec<FollowEvent>,
    pub total: i64,
    pub page: i64,
}

/// GET /api/follow-events?fid=&limit=&page=
/// Newest-first feed; `fid` matches either side of the event
#[get("/api/follow-events")]
pub async fn get_follow_events(
    state: web::Data<AppState>,
    query: web::Query<FollowEventsQuery>,
) -> Result<HttpResponse, AppError> {
    let pagination = Pagination::resolve(query.limit, query.page, DEFAULT_LIMIT, MAX_LIMIT);

    let (data, total) = state
        .queries
        .follow_events_page(query.fid, pagination.limit, pagination.offset())
        .await?;

    Ok(HttpResponse::Ok().json(FollowEventsResponse {
        data,
        total,
        page: pagination.page,
    }))
}
