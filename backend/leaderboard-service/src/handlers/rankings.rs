use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{AppState, Pagination};
use crate::domain::{HourBucket, MetricKey, RankedUser};
use crate::error::AppError;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct RankingsQuery {
    pub metric: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RankingsResponse {
    pub data: Vec<RankedUser>,
    pub total: i64,
    pub page: i64,
    pub metric: MetricKey,
    pub ts_hour: Option<HourBucket>,
}

/// GET /api/rankings?metric=&limit=&page=
/// Latest leaderboard for a metric, joined with current user attributes
#[get("/api/rankings")]
pub async fn get_rankings(
    state: web::Data<AppState>,
    query: web::Query<RankingsQuery>,
) -> Result<HttpResponse, AppError> {
    let metric: MetricKey = match query.metric.as_deref() {
        Some(raw) => raw.parse().map_err(AppError::Validation)?,
        None => MetricKey::Growth24h,
    };
    let pagination = Pagination::resolve(query.limit, query.page, DEFAULT_LIMIT, MAX_LIMIT);

    let Some(ts_hour) = state.queries.latest_ranking_hour(metric).await? else {
        return Ok(HttpResponse::Ok().json(RankingsResponse {
            data: Vec::new(),
            total: 0,
            page: pagination.page,
            metric,
            ts_hour: None,
        }));
    };

    let (entries, total) = state
        .queries
        .ranking_page(ts_hour, metric, pagination.limit, pagination.offset())
        .await?;

    let fids: Vec<_> = entries.iter().map(|e| e.fid).collect();
    let mut users: HashMap<_, _> = state
        .queries
        .tracked_users_by_fids(&fids)
        .await?
        .into_iter()
        .map(|u| (u.fid, u))
        .collect();

    let data = entries
        .into_iter()
        .map(|entry| RankedUser {
            rank: entry.rank,
            score: entry.score,
            user: users.remove(&entry.fid),
        })
        .collect();

    Ok(HttpResponse::Ok().json(RankingsResponse {
        data,
        total,
        page: pagination.page,
        metric,
        ts_hour: Some(ts_hour),
    }))
}
