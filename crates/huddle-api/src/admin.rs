//! Administrative surface. Every operation re-checks the caller's admin
//! flag against the database, so a revoked admin loses access on their
//! next request even with a still-valid token.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use huddle_db::Database;
use huddle_db::models::ChannelRow;
use huddle_types::api::{
    AddMemberRequest, ChannelResponse, Claims, CreateChannelRequest, MemberResponse,
    UpdateUserRequest, UserProfile,
};

use crate::error::ApiError;
use crate::state::AppState;
use crate::{blocking, view};

pub const DEFAULT_CHANNEL: &str = "General";

fn require_admin(db: &Database, caller: Uuid) -> Result<(), ApiError> {
    if !db.is_admin(caller)? {
        return Err(ApiError::Forbidden("admin access required".into()));
    }
    Ok(())
}

fn channel_with_members(db: &Database, channel: ChannelRow) -> Result<ChannelResponse, ApiError> {
    let members = db
        .list_members(channel.id)?
        .into_iter()
        .map(|m| MemberResponse {
            id: m.id,
            channel_id: m.channel_id,
            user_id: m.user_id,
            joined_at: m.joined_at,
        })
        .collect();
    Ok(ChannelResponse {
        id: channel.id,
        name: channel.name,
        description: channel.description,
        is_private: channel.is_private,
        created_by: channel.created_by,
        created_at: channel.created_at,
        members: Some(members),
    })
}

// -- Channels --

pub async fn list_channels(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let channels = blocking(move || list_channels_op(&db, claims.sub)).await?;
    Ok(Json(channels))
}

pub fn list_channels_op(db: &Database, caller: Uuid) -> Result<Vec<ChannelResponse>, ApiError> {
    require_admin(db, caller)?;
    db.list_channels()?
        .into_iter()
        .map(|c| channel_with_members(db, c))
        .collect()
}

pub async fn create_channel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let channel = blocking(move || create_channel_op(&db, claims.sub, req)).await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

/// New channels start with every active user as a member.
pub fn create_channel_op(
    db: &Database,
    caller: Uuid,
    req: CreateChannelRequest,
) -> Result<ChannelResponse, ApiError> {
    require_admin(db, caller)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("channel name required".into()));
    }
    if db.get_channel_by_name(name)?.is_some() {
        return Err(ApiError::Conflict("channel name already taken".into()));
    }

    let channel = db.create_channel(Uuid::new_v4(), name, req.description.as_deref(), Some(caller))?;
    let members = db.active_user_ids()?;
    let added = db.add_members_bulk(channel.id, &members)?;
    info!(channel = %channel.name, members = added, "channel created");

    channel_with_members(db, channel)
}

pub async fn delete_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    blocking(move || delete_channel_op(&db, claims.sub, channel_id)).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn delete_channel_op(db: &Database, caller: Uuid, channel_id: Uuid) -> Result<(), ApiError> {
    require_admin(db, caller)?;
    if !db.delete_channel(channel_id)? {
        return Err(ApiError::NotFound("channel not found".into()));
    }
    Ok(())
}

// -- Membership --

pub async fn add_member(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let member = blocking(move || add_member_op(&db, claims.sub, channel_id, req.user_id)).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub fn add_member_op(
    db: &Database,
    caller: Uuid,
    channel_id: Uuid,
    user_id: Uuid,
) -> Result<MemberResponse, ApiError> {
    require_admin(db, caller)?;
    if db.get_channel(channel_id)?.is_none() {
        return Err(ApiError::NotFound("channel not found".into()));
    }
    if db.get_user(user_id)?.is_none() {
        return Err(ApiError::NotFound("user not found".into()));
    }

    let m = db.add_member(channel_id, user_id)?;
    Ok(MemberResponse {
        id: m.id,
        channel_id: m.channel_id,
        user_id: m.user_id,
        joined_at: m.joined_at,
    })
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((channel_id, user_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    blocking(move || remove_member_op(&db, claims.sub, channel_id, user_id)).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn remove_member_op(
    db: &Database,
    caller: Uuid,
    channel_id: Uuid,
    user_id: Uuid,
) -> Result<(), ApiError> {
    require_admin(db, caller)?;
    if !db.remove_member(channel_id, user_id)? {
        return Err(ApiError::NotFound("membership not found".into()));
    }
    Ok(())
}

// -- Users --

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let users = blocking(move || list_users_op(&db, claims.sub)).await?;
    Ok(Json(users))
}

/// Full directory, inactive users included.
pub fn list_users_op(db: &Database, caller: Uuid) -> Result<Vec<UserProfile>, ApiError> {
    require_admin(db, caller)?;
    Ok(db.list_users(false)?.into_iter().map(view::profile).collect())
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user = blocking(move || update_user_op(&db, claims.sub, user_id, req)).await?;
    Ok(Json(user))
}

pub fn update_user_op(
    db: &Database,
    caller: Uuid,
    user_id: Uuid,
    req: UpdateUserRequest,
) -> Result<UserProfile, ApiError> {
    require_admin(db, caller)?;
    if db.get_user(user_id)?.is_none() {
        return Err(ApiError::NotFound("user not found".into()));
    }
    // Admins cannot lock themselves out by dropping their own flag.
    if user_id == caller && req.is_admin == Some(false) {
        return Err(ApiError::BadRequest("cannot remove your own admin access".into()));
    }

    let row = db.update_user_flags(user_id, req.is_active, req.is_admin)?;
    Ok(view::profile(row))
}

// -- One-time workspace setup --

pub async fn setup(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let channel = blocking(move || setup_op(&db, claims.sub)).await?;
    Ok(Json(channel))
}

/// Find-or-create the default channel and backfill all active users as
/// members. Safe to call repeatedly.
pub fn setup_op(db: &Database, caller: Uuid) -> Result<ChannelResponse, ApiError> {
    require_admin(db, caller)?;

    let channel = match db.get_channel_by_name(DEFAULT_CHANNEL)? {
        Some(existing) => existing,
        None => db.create_channel(Uuid::new_v4(), DEFAULT_CHANNEL, None, Some(caller))?,
    };
    let members = db.active_user_ids()?;
    let added = db.add_members_bulk(channel.id, &members)?;
    if added > 0 {
        info!(channel = %channel.name, backfilled = added, "default channel membership backfilled");
    }

    channel_with_members(db, channel)
}
