//! Notification preferences and the Mini App lifecycle webhook
use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{parse_fid, AppState};
use crate::domain::{Fid, Locale, NotificationSubscription, SubscriptionUpdate, IN_APP_CHANNEL};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub fid: Option<Fid>,
    pub enabled: Option<bool>,
    pub threshold_followers: Option<i64>,
    pub locale: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub ok: bool,
    pub subscription: NotificationSubscription,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    pub fid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub subscription: Option<NotificationSubscription>,
}

/// POST /api/notifications/subscribe
/// Partial upsert; unsupported locales are ignored rather than rejected
#[post("/api/notifications/subscribe")]
pub async fn subscribe(
    state: web::Data<AppState>,
    body: web::Json<SubscribeRequest>,
) -> Result<HttpResponse, AppError> {
    let fid = body
        .fid
        .filter(|fid| *fid > 0)
        .ok_or_else(|| AppError::Validation("fid (number) is required".to_string()))?;

    let update = SubscriptionUpdate {
        fid,
        enabled: body.enabled,
        channel: None,
        threshold_followers: body.threshold_followers,
        locale: body.locale.as_deref().and_then(Locale::parse),
    };

    let subscription = state.queries.upsert_subscription(&update, Utc::now()).await?;
    debug!(fid, enabled = subscription.enabled, "Notification subscription updated");

    Ok(HttpResponse::Ok().json(SubscribeResponse {
        ok: true,
        subscription,
    }))
}

/// GET /api/notifications/subscribe?fid=
#[get("/api/notifications/subscribe")]
pub async fn get_subscription(
    state: web::Data<AppState>,
    query: web::Query<SubscriptionQuery>,
) -> Result<HttpResponse, AppError> {
    let raw = query
        .fid
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("fid query param is required".to_string()))?;
    let fid = parse_fid(raw)?;

    let subscription = state.queries.subscription(fid).await?;

    Ok(HttpResponse::Ok().json(SubscriptionResponse { subscription }))
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub event: Option<String>,
    pub fid: Option<Value>,
}

/// Mini App lifecycle events we act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    FrameAdded(Fid),
    FrameRemoved(Fid),
}

impl WebhookPayload {
    /// `None` for unknown events or a missing/unusable fid
    pub fn parse(&self) -> Option<WebhookEvent> {
        let fid = match self.fid.as_ref()? {
            Value::Number(n) => n.as_i64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        if fid <= 0 {
            return None;
        }
        match self.event.as_deref()? {
            "frame_added" => Some(WebhookEvent::FrameAdded(fid)),
            "frame_removed" => Some(WebhookEvent::FrameRemoved(fid)),
            _ => None,
        }
    }
}

/// POST /api/webhook
#[post("/api/webhook")]
pub async fn webhook(
    state: web::Data<AppState>,
    body: web::Json<WebhookPayload>,
) -> Result<HttpResponse, AppError> {
    let now = Utc::now();

    match body.parse() {
        Some(WebhookEvent::FrameAdded(fid)) => {
            let update = SubscriptionUpdate {
                fid,
                enabled: Some(true),
                channel: Some(IN_APP_CHANNEL.to_string()),
                ..SubscriptionUpdate::default()
            };
            state.queries.upsert_subscription(&update, now).await?;
            info!(fid, "Mini App added, notifications enabled");
        }
        Some(WebhookEvent::FrameRemoved(fid)) => {
            let existed = state.queries.set_subscription_enabled(fid, false, now).await?;
            info!(fid, existed, "Mini App removed, notifications disabled");
        }
        None => {
            debug!(event = ?body.event, "Ignoring webhook event");
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> WebhookPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parses_numeric_and_string_fids() {
        assert_eq!(
            payload(json!({ "event": "frame_added", "fid": 42 })).parse(),
            Some(WebhookEvent::FrameAdded(42))
        );
        assert_eq!(
            payload(json!({ "event": "frame_removed", "fid": "42" })).parse(),
            Some(WebhookEvent::FrameRemoved(42))
        );
    }

    #[test]
    fn test_ignores_unknown_or_incomplete_events() {
        assert_eq!(payload(json!({ "event": "notifications_enabled", "fid": 1 })).parse(), None);
        assert_eq!(payload(json!({ "event": "frame_added" })).parse(), None);
        assert_eq!(payload(json!({ "event": "frame_added", "fid": "abc" })).parse(), None);
        assert_eq!(payload(json!({})).parse(), None);
    }
}
