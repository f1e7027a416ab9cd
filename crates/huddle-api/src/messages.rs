//! Channel message surface: the poll-based synchronization protocol plus
//! the mutation operations.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use huddle_db::Database;
use huddle_types::api::{Claims, EditMessageRequest, MessageResponse, SendMessageRequest};

use crate::error::ApiError;
use crate::state::AppState;
use crate::{blocking, view};

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    /// Sequence cursor: return only messages with a strictly greater `seq`.
    pub after: Option<i64>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Query(query): Query<PollQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let messages =
        blocking(move || list_messages_op(&db, claims.sub, channel_id, query.after)).await?;
    Ok(Json(messages))
}

pub fn list_messages_op(
    db: &Database,
    caller: Uuid,
    channel_id: Uuid,
    after: Option<i64>,
) -> Result<Vec<MessageResponse>, ApiError> {
    require_membership(db, channel_id, caller)?;
    let rows = db.list_channel_messages(channel_id, after)?;
    view::message_views(db, rows)
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let message = blocking(move || {
        send_message_op(&db, claims.sub, channel_id, &req.content, req.reply_to_id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub fn send_message_op(
    db: &Database,
    caller: Uuid,
    channel_id: Uuid,
    content: &str,
    reply_to_id: Option<Uuid>,
) -> Result<MessageResponse, ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("content required".into()));
    }
    require_membership(db, channel_id, caller)?;

    if let Some(reply_to) = reply_to_id {
        let target = db
            .get_message(reply_to)?
            .ok_or_else(|| ApiError::NotFound("reply target not found".into()))?;
        if target.channel_id != channel_id {
            return Err(ApiError::BadRequest("reply target is in another channel".into()));
        }
    }

    let row = db.insert_message(Uuid::new_v4(), channel_id, caller, content, reply_to_id)?;
    view::message_view(db, row)
}

pub async fn edit_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let message = blocking(move || edit_message_op(&db, claims.sub, message_id, &req.content)).await?;
    Ok(Json(message))
}

/// Only the original sender may edit.
pub fn edit_message_op(
    db: &Database,
    caller: Uuid,
    message_id: Uuid,
    content: &str,
) -> Result<MessageResponse, ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("content required".into()));
    }
    let message = db
        .get_message(message_id)?
        .ok_or_else(|| ApiError::NotFound("message not found".into()))?;
    if message.sender_id != caller {
        return Err(ApiError::Forbidden("only the sender may edit a message".into()));
    }

    let row = db.edit_message(message_id, content)?;
    view::message_view(db, row)
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    blocking(move || delete_message_op(&db, claims.sub, message_id)).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// The sender may always delete their own message; an admin may delete any
/// channel message. Deletion is hard, no tombstone.
pub fn delete_message_op(db: &Database, caller: Uuid, message_id: Uuid) -> Result<(), ApiError> {
    let message = db
        .get_message(message_id)?
        .ok_or_else(|| ApiError::NotFound("message not found".into()))?;

    if message.sender_id != caller && !db.is_admin(caller)? {
        return Err(ApiError::Forbidden(
            "only the sender or an admin may delete a message".into(),
        ));
    }

    db.delete_message(message_id)?;
    Ok(())
}

pub(crate) fn require_membership(db: &Database, channel_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
    if db.get_channel(channel_id)?.is_none() {
        return Err(ApiError::NotFound("channel not found".into()));
    }
    if !db.is_member(channel_id, user_id)? {
        return Err(ApiError::Forbidden("not a member of this channel".into()));
    }
    Ok(())
}

// -- Channel listing for the signed-in user --

pub async fn list_my_channels(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let channels = blocking(move || {
        let rows = db.list_channels_for_user(claims.sub)?;
        Ok(rows
            .into_iter()
            .map(|c| huddle_types::api::ChannelResponse {
                id: c.id,
                name: c.name,
                description: c.description,
                is_private: c.is_private,
                created_by: c.created_by,
                created_at: c.created_at,
                members: None,
            })
            .collect::<Vec<_>>())
    })
    .await?;
    Ok(Json(channels))
}
