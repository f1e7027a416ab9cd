use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_db::Database;
use huddle_types::api::{Claims, ReactionGroup, ToggleReactionRequest};

use crate::error::ApiError;
use crate::messages::require_membership;
use crate::state::AppState;
use crate::{blocking, view};

pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let reactions =
        blocking(move || toggle_reaction_op(&db, claims.sub, message_id, &req.emoji)).await?;
    Ok(Json(reactions))
}

/// Toggle the caller's (message, emoji) reaction and return the message's
/// full updated reaction set. Not idempotent: repeating the call flips the
/// state back (involution), which retrying clients must account for.
pub fn toggle_reaction_op(
    db: &Database,
    caller: Uuid,
    message_id: Uuid,
    emoji: &str,
) -> Result<Vec<ReactionGroup>, ApiError> {
    if emoji.is_empty() {
        return Err(ApiError::BadRequest("emoji required".into()));
    }
    let message = db
        .get_message(message_id)?
        .ok_or_else(|| ApiError::NotFound("message not found".into()))?;
    require_membership(db, message.channel_id, caller)?;

    db.toggle_reaction(message_id, caller, emoji)?;

    let rows = db.reactions_for_message(message_id)?;
    Ok(view::group_reactions(&rows).remove(&message_id).unwrap_or_default())
}

pub async fn toggle_dm_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let reactions =
        blocking(move || toggle_dm_reaction_op(&db, claims.sub, message_id, &req.emoji)).await?;
    Ok(Json(reactions))
}

pub fn toggle_dm_reaction_op(
    db: &Database,
    caller: Uuid,
    message_id: Uuid,
    emoji: &str,
) -> Result<Vec<ReactionGroup>, ApiError> {
    if emoji.is_empty() {
        return Err(ApiError::BadRequest("emoji required".into()));
    }
    let message = db
        .get_dm(message_id)?
        .ok_or_else(|| ApiError::NotFound("message not found".into()))?;
    if message.sender_id != caller && message.recipient_id != caller {
        return Err(ApiError::Forbidden("not a party to this conversation".into()));
    }

    db.toggle_dm_reaction(message_id, caller, emoji)?;

    let rows = db.reactions_for_dm(message_id)?;
    Ok(view::group_reactions(&rows).remove(&message_id).unwrap_or_default())
}
