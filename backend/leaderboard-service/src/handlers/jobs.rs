use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::AppState;
use crate::error::AppError;
use crate::jobs::JobError;

#[derive(Debug, Deserialize)]
pub struct TriggerQuery {
    pub secret: Option<String>,
}

#[derive(Serialize)]
struct JobResponse<T: Serialize> {
    ok: bool,
    #[serde(flatten)]
    result: T,
}

fn authorize(state: &AppState, query: &TriggerQuery, job: &str) -> Result<(), AppError> {
    if state.jobs.authorize(query.secret.as_deref()) {
        return Ok(());
    }
    warn!(job_name = job, "Rejected job trigger with invalid secret");
    Err(AppError::Unauthorized)
}

/// GET /api/jobs/ingest?secret=
#[get("/api/jobs/ingest")]
pub async fn trigger_ingest(
    state: web::Data<AppState>,
    query: web::Query<TriggerQuery>,
) -> Result<HttpResponse, AppError> {
    authorize(&state, &query, "ingest")?;

    let summary = state.jobs.run_ingest(Utc::now()).await?;

    Ok(HttpResponse::Ok().json(JobResponse {
        ok: true,
        result: summary,
    }))
}

/// GET /api/jobs/retention?secret=
#[get("/api/jobs/retention")]
pub async fn trigger_retention(
    state: web::Data<AppState>,
    query: web::Query<TriggerQuery>,
) -> Result<HttpResponse, AppError> {
    authorize(&state, &query, "retention")?;

    match state.jobs.run_retention(Utc::now()).await {
        Ok(report) => Ok(HttpResponse::Ok().json(JobResponse {
            ok: true,
            result: report,
        })),
        // Tables that were swept still report their counts
        Err(JobError::PartialRetention(report)) => {
            Ok(HttpResponse::InternalServerError().json(JobResponse {
                ok: false,
                result: json!({
                    "error": report.to_string(),
                    "cutoff": report.cutoff,
                    "deleted_counts": report.deleted_counts,
                    "failures": report.failures,
                }),
            }))
        }
        Err(e) => Err(e.into()),
    }
}
