use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};

use huddle_push::NotificationPayload;
use huddle_types::api::{Claims, SendPushRequest, SubscribeRequest, UnsubscribeRequest};

use crate::error::ApiError;
use crate::state::AppState;
use crate::blocking;

pub async fn subscribe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.endpoint.trim().is_empty() {
        return Err(ApiError::BadRequest("endpoint must not be empty".into()));
    }
    let db = state.db.clone();
    blocking(move || {
        db.upsert_push_subscription(claims.sub, &req.endpoint, &req.keys.p256dh, &req.keys.auth)
            .map_err(ApiError::from)
    })
    .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UnsubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    blocking(move || {
        db.delete_push_subscription(claims.sub, &req.endpoint)
            .map_err(ApiError::from)
    })
    .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Direct dispatch to a single user. Unlike the DM side channel this one is
/// synchronous: the caller learns whether dispatch actually ran.
pub async fn send(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<SendPushRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.dispatcher.enabled() {
        return Err(ApiError::Internal("push dispatch is not configured".into()));
    }

    let payload =
        NotificationPayload::new(&req.title, &req.body, req.url.as_deref(), req.tag.as_deref());
    let sent = state
        .dispatcher
        .notify(&state.db, &[req.user_id], payload)
        .await;
    if !sent {
        return Err(ApiError::Internal("push dispatch failed".into()));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
