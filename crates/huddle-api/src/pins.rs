//! Message pinning. Any channel member may pin or unpin.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_db::Database;
use huddle_types::api::{Claims, MessageResponse};

use crate::error::ApiError;
use crate::messages::require_membership;
use crate::state::AppState;
use crate::{blocking, view};

pub async fn pin_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let message = blocking(move || set_pinned_op(&db, claims.sub, message_id, true)).await?;
    Ok(Json(message))
}

pub async fn unpin_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let message = blocking(move || set_pinned_op(&db, claims.sub, message_id, false)).await?;
    Ok(Json(message))
}

pub fn set_pinned_op(
    db: &Database,
    caller: Uuid,
    message_id: Uuid,
    pinned: bool,
) -> Result<MessageResponse, ApiError> {
    let message = db
        .get_message(message_id)?
        .ok_or_else(|| ApiError::NotFound("message not found".into()))?;
    require_membership(db, message.channel_id, caller)?;

    let pinned_by = pinned.then_some(caller);
    let row = db.set_pinned(message_id, pinned, pinned_by)?;
    view::message_view(db, row)
}

pub async fn list_pinned(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let messages = blocking(move || list_pinned_op(&db, claims.sub, channel_id)).await?;
    Ok(Json(messages))
}

pub fn list_pinned_op(
    db: &Database,
    caller: Uuid,
    channel_id: Uuid,
) -> Result<Vec<MessageResponse>, ApiError> {
    require_membership(db, channel_id, caller)?;
    let rows = db.list_pinned_messages(channel_id)?;
    view::message_views(db, rows)
}
