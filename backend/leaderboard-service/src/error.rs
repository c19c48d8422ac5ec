/// HTTP-facing error type for leaderboard-service
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::jobs::JobError;
use crate::providers::ProviderError;
use crate::repository::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Provider refused a write because the signer is not approved yet
    #[error("Signer not approved. Please approve the signer in Warpcast first.")]
    SignerNotApproved,

    #[error("{0}")]
    Provider(ProviderError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Job(#[from] JobError),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::SignerNotApproved(_) => AppError::SignerNotApproved,
            other => AppError::Provider(other),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_approval: Option<bool>,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SignerNotApproved => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let needs_approval = matches!(self, AppError::SignerNotApproved).then_some(true);

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
            needs_approval,
        })
    }
}
