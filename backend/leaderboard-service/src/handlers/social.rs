use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use crate::domain::{Fid, FollowAction};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct SocialActionRequest {
    pub signer_uuid: Option<String>,
    pub target_fid: Option<Fid>,
}

#[derive(Debug, Serialize)]
pub struct SocialActionResponse {
    pub ok: bool,
    pub action: FollowAction,
    pub target_fid: Fid,
}

impl SocialActionRequest {
    fn validate(&self) -> Result<(&str, Fid), AppError> {
        let signer_uuid = self
            .signer_uuid
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::Validation("signer_uuid is required".to_string()))?;
        let target_fid = self
            .target_fid
            .filter(|fid| *fid > 0)
            .ok_or_else(|| AppError::Validation("target_fid (number) is required".to_string()))?;
        Ok((signer_uuid, target_fid))
    }
}

async fn perform(
    state: &AppState,
    body: &SocialActionRequest,
    action: FollowAction,
) -> Result<HttpResponse, AppError> {
    let (signer_uuid, target_fid) = body.validate()?;

    match action {
        FollowAction::Follow => state.provider.follow_user(signer_uuid, target_fid).await?,
        FollowAction::Unfollow => state.provider.unfollow_user(signer_uuid, target_fid).await?,
    }

    info!(target_fid, action = action.as_str(), "Social action forwarded to provider");

    Ok(HttpResponse::Ok().json(SocialActionResponse {
        ok: true,
        action,
        target_fid,
    }))
}

/// POST /api/social/follow
#[post("/api/social/follow")]
pub async fn follow(
    state: web::Data<AppState>,
    body: web::Json<SocialActionRequest>,
) -> Result<HttpResponse, AppError> {
    perform(&state, &body, FollowAction::Follow).await
}

/// POST /api/social/unfollow
#[post("/api/social/unfollow")]
pub async fn unfollow(
    state: web::Data<AppState>,
    body: web::Json<SocialActionRequest>,
) -> Result<HttpResponse, AppError> {
    perform(&state, &body, FollowAction::Unfollow).await
}
