//! Direct message surface. The conversation selector is the peer's user id;
//! the caller is always implicitly one of the two parties, so there is no
//! membership table to consult — only existence and party checks.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use huddle_db::Database;
use huddle_push::NotificationPayload;
use huddle_types::api::{Claims, DirectMessageResponse, EditMessageRequest, SendMessageRequest};

use crate::error::ApiError;
use crate::messages::PollQuery;
use crate::state::AppState;
use crate::{blocking, view};

/// Notification bodies are clipped to keep lock-screen previews short.
const NOTIFY_BODY_MAX: usize = 120;

pub async fn list_dms(
    State(state): State<AppState>,
    Path(peer_id): Path<Uuid>,
    Query(query): Query<PollQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let messages = blocking(move || list_dms_op(&db, claims.sub, peer_id, query.after)).await?;
    Ok(Json(messages))
}

pub fn list_dms_op(
    db: &Database,
    caller: Uuid,
    peer_id: Uuid,
    after: Option<i64>,
) -> Result<Vec<DirectMessageResponse>, ApiError> {
    if db.get_user(peer_id)?.is_none() {
        return Err(ApiError::NotFound("user not found".into()));
    }

    // Reading the conversation implies having seen the incoming side.
    if let Err(e) = db.mark_dms_read(caller, peer_id) {
        debug!("mark_dms_read failed (ignored): {e}");
    }

    let rows = db.list_dms(caller, peer_id, after)?;
    view::dm_views(db, rows)
}

pub async fn send_dm(
    State(state): State<AppState>,
    Path(peer_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let message =
        blocking(move || send_dm_op(&db, claims.sub, peer_id, &req.content, req.reply_to_id))
            .await?;

    // Best-effort push to the recipient; never fails the send.
    let sender_name = message
        .sender
        .full_name
        .clone()
        .unwrap_or_else(|| message.sender.email.clone());
    let body = notification_body(&message.content);
    let payload = NotificationPayload::new(
        &format!("New message from {sender_name}"),
        &body,
        Some("/chat"),
        Some(&format!("dm-{}", claims.sub)),
    );
    let dispatcher = state.dispatcher.clone();
    let db = state.db.clone();
    tokio::spawn(async move {
        dispatcher.notify(&db, &[peer_id], payload).await;
    });

    Ok((StatusCode::CREATED, Json(message)))
}

pub fn send_dm_op(
    db: &Database,
    caller: Uuid,
    peer_id: Uuid,
    content: &str,
    reply_to_id: Option<Uuid>,
) -> Result<DirectMessageResponse, ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("content required".into()));
    }
    if db.get_user(peer_id)?.is_none() {
        return Err(ApiError::NotFound("recipient not found".into()));
    }

    if let Some(reply_to) = reply_to_id {
        let target = db
            .get_dm(reply_to)?
            .ok_or_else(|| ApiError::NotFound("reply target not found".into()))?;
        let same_pair = (target.sender_id == caller && target.recipient_id == peer_id)
            || (target.sender_id == peer_id && target.recipient_id == caller);
        if !same_pair {
            return Err(ApiError::BadRequest("reply target is in another conversation".into()));
        }
    }

    let row = db.insert_dm(Uuid::new_v4(), caller, peer_id, content, reply_to_id)?;
    view::dm_view(db, row)
}

pub async fn edit_dm(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let message = blocking(move || edit_dm_op(&db, claims.sub, message_id, &req.content)).await?;
    Ok(Json(message))
}

pub fn edit_dm_op(
    db: &Database,
    caller: Uuid,
    message_id: Uuid,
    content: &str,
) -> Result<DirectMessageResponse, ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("content required".into()));
    }
    let message = db
        .get_dm(message_id)?
        .ok_or_else(|| ApiError::NotFound("message not found".into()))?;
    if message.sender_id != caller {
        return Err(ApiError::Forbidden("only the sender may edit a message".into()));
    }

    let row = db.edit_dm(message_id, content)?;
    view::dm_view(db, row)
}

pub async fn delete_dm(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    blocking(move || delete_dm_op(&db, claims.sub, message_id)).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// No admin override here: direct messages are private to their two parties.
pub fn delete_dm_op(db: &Database, caller: Uuid, message_id: Uuid) -> Result<(), ApiError> {
    let message = db
        .get_dm(message_id)?
        .ok_or_else(|| ApiError::NotFound("message not found".into()))?;
    if message.sender_id != caller {
        return Err(ApiError::Forbidden("only the sender may delete a message".into()));
    }

    db.delete_dm(message_id)?;
    Ok(())
}

/// Clip the message content for a lock-screen preview. Counted in chars,
/// not bytes, so multi-byte content clips the same as ASCII.
fn notification_body(content: &str) -> String {
    if content.chars().count() > NOTIFY_BODY_MAX {
        content.chars().take(NOTIFY_BODY_MAX).collect()
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_body_clips_by_chars() {
        let short = "hello";
        assert_eq!(notification_body(short), short);

        let long_ascii = "a".repeat(NOTIFY_BODY_MAX + 30);
        assert_eq!(notification_body(&long_ascii).chars().count(), NOTIFY_BODY_MAX);

        // Multi-byte content: over the char cap even though each char is 3+ bytes.
        let long_emoji: String = std::iter::repeat('語').take(NOTIFY_BODY_MAX + 1).collect();
        let clipped = notification_body(&long_emoji);
        assert_eq!(clipped.chars().count(), NOTIFY_BODY_MAX);

        // Exactly at the cap passes through untouched.
        let exact: String = std::iter::repeat('語').take(NOTIFY_BODY_MAX).collect();
        assert_eq!(notification_body(&exact), exact);
    }
}
