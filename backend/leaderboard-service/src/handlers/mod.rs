//! HTTP surface
//!
//! Handlers borrow their dependencies from [`AppState`]; nothing is constructed
//! per request.
use actix_web::{error::InternalError, web, HttpResponse};
use std::sync::Arc;

use crate::error::{AppError, ErrorResponse};
use crate::jobs::JobContext;
use crate::providers::SocialGraphProvider;
use crate::repository::QueryStore;

pub mod events;
pub mod health;
pub mod jobs;
pub mod notifications;
pub mod rankings;
pub mod social;
pub mod users;

#[derive(Clone)]
pub struct AppState {
    pub jobs: JobContext,
    pub queries: Arc<dyn QueryStore>,
    pub provider: Arc<dyn SocialGraphProvider>,
}

impl AppState {
    pub fn new(
        jobs: JobContext,
        queries: Arc<dyn QueryStore>,
        provider: Arc<dyn SocialGraphProvider>,
    ) -> Self {
        Self {
            jobs,
            queries,
            provider,
        }
    }
}

/// Register every route plus extractor error handlers that answer in the
/// service's JSON error shape
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid request body: {}", err);
        InternalError::from_response(err, bad_request(message)).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid query parameters: {}", err);
        InternalError::from_response(err, bad_request(message)).into()
    }))
    .service(jobs::trigger_ingest)
    .service(jobs::trigger_retention)
    .service(rankings::get_rankings)
    .service(events::get_follow_events)
    .service(users::get_user_activity)
    .service(social::follow)
    .service(social::unfollow)
    .service(notifications::subscribe)
    .service(notifications::get_subscription)
    .service(notifications::webhook)
    .service(health::health)
    .service(health::ready)
    .service(health::metrics);
}

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: message,
        needs_approval: None,
    })
}

/// Resolved `limit`/`page` query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub page: i64,
}

impl Pagination {
    /// Missing values take `default_limit` and page 1; limit is clamped to `1..=max_limit`
    pub fn resolve(limit: Option<i64>, page: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        Self {
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
            page: page.unwrap_or(1).max(1),
        }
    }

    /// Saturates instead of overflowing; a huge page just lands past the end
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

pub(crate) fn parse_fid(raw: &str) -> Result<crate::domain::Fid, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Validation("Invalid fid".to_string()))
}
