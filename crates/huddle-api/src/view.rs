//! Assembly of store rows into API response shapes: reaction grouping,
//! attachment and reply-target joins. Shared by the channel-message and
//! direct-message surfaces.

use std::collections::HashMap;

use uuid::Uuid;

use huddle_db::Database;
use huddle_db::models::{
    AttachmentRow, DmRow, MessageRow, ReactionRow, ReplyRow, UserRow,
};
use huddle_types::api::{
    AttachmentResponse, DirectMessageResponse, MessageResponse, ReactionGroup, ReplyPreview,
    UserProfile, UserSummary,
};

use crate::error::ApiError;

pub fn profile(row: UserRow) -> UserProfile {
    UserProfile {
        id: row.id,
        email: row.email,
        full_name: row.full_name,
        is_admin: row.is_admin,
        is_active: row.is_active,
        status: row.status,
        last_seen_at: row.last_seen_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Group flat reaction rows by message, then by emoji.
pub fn group_reactions(rows: &[ReactionRow]) -> HashMap<Uuid, Vec<ReactionGroup>> {
    let mut by_message: HashMap<Uuid, HashMap<String, Vec<Uuid>>> = HashMap::new();
    for r in rows {
        by_message
            .entry(r.message_id)
            .or_default()
            .entry(r.emoji.clone())
            .or_default()
            .push(r.user_id);
    }

    by_message
        .into_iter()
        .map(|(message_id, emoji_map)| {
            let groups = emoji_map
                .into_iter()
                .map(|(emoji, user_ids)| ReactionGroup {
                    emoji,
                    count: user_ids.len(),
                    user_ids,
                })
                .collect();
            (message_id, groups)
        })
        .collect()
}

fn index_attachments(rows: Vec<AttachmentRow>) -> HashMap<Uuid, Vec<AttachmentResponse>> {
    let mut map: HashMap<Uuid, Vec<AttachmentResponse>> = HashMap::new();
    for a in rows {
        map.entry(a.owner_id).or_default().push(AttachmentResponse {
            id: a.id,
            filename: a.filename,
            data_url: a.data_url,
            mime_type: a.mime_type,
            size: a.size,
        });
    }
    map
}

fn index_replies(rows: Vec<ReplyRow>) -> HashMap<Uuid, ReplyPreview> {
    rows.into_iter()
        .map(|r| {
            (
                r.id,
                ReplyPreview {
                    id: r.id,
                    content: r.content,
                    sender: UserSummary {
                        id: r.sender_id,
                        email: r.sender_email,
                        full_name: r.sender_full_name,
                    },
                },
            )
        })
        .collect()
}

/// Join a page of channel messages with reactions, attachments and reply
/// targets (three batch queries, no per-row lookups).
pub fn message_views(db: &Database, rows: Vec<MessageRow>) -> Result<Vec<MessageResponse>, ApiError> {
    let ids: Vec<Uuid> = rows.iter().map(|m| m.id).collect();
    let reply_ids: Vec<Uuid> = rows.iter().filter_map(|m| m.reply_to_id).collect();

    let mut reactions = group_reactions(&db.reactions_for_messages(&ids)?);
    let mut attachments = index_attachments(db.attachments_for_messages(&ids)?);
    let replies = index_replies(db.reply_previews(&reply_ids)?);

    Ok(rows
        .into_iter()
        .map(|m| MessageResponse {
            seq: m.seq,
            id: m.id,
            channel_id: m.channel_id,
            sender: UserSummary {
                id: m.sender_id,
                email: m.sender_email,
                full_name: m.sender_full_name,
            },
            content: m.content,
            reply_to: m.reply_to_id.and_then(|r| replies.get(&r).cloned()),
            is_edited: m.is_edited,
            is_pinned: m.is_pinned,
            created_at: m.created_at,
            updated_at: m.updated_at,
            reactions: reactions.remove(&m.id).unwrap_or_default(),
            attachments: attachments.remove(&m.id).unwrap_or_default(),
        })
        .collect())
}

pub fn message_view(db: &Database, row: MessageRow) -> Result<MessageResponse, ApiError> {
    let mut views = message_views(db, vec![row])?;
    views.pop().ok_or_else(|| ApiError::Internal("empty view page".into()))
}

pub fn dm_views(db: &Database, rows: Vec<DmRow>) -> Result<Vec<DirectMessageResponse>, ApiError> {
    let ids: Vec<Uuid> = rows.iter().map(|m| m.id).collect();
    let reply_ids: Vec<Uuid> = rows.iter().filter_map(|m| m.reply_to_id).collect();

    let mut reactions = group_reactions(&db.reactions_for_dms(&ids)?);
    let mut attachments = index_attachments(db.attachments_for_dms(&ids)?);
    let replies = index_replies(db.dm_reply_previews(&reply_ids)?);

    Ok(rows
        .into_iter()
        .map(|m| DirectMessageResponse {
            seq: m.seq,
            id: m.id,
            sender: UserSummary {
                id: m.sender_id,
                email: m.sender_email,
                full_name: m.sender_full_name,
            },
            recipient: UserSummary {
                id: m.recipient_id,
                email: m.recipient_email,
                full_name: m.recipient_full_name,
            },
            content: m.content,
            reply_to: m.reply_to_id.and_then(|r| replies.get(&r).cloned()),
            is_edited: m.is_edited,
            is_read: m.is_read,
            created_at: m.created_at,
            updated_at: m.updated_at,
            reactions: reactions.remove(&m.id).unwrap_or_default(),
            attachments: attachments.remove(&m.id).unwrap_or_default(),
        })
        .collect())
}

pub fn dm_view(db: &Database, row: DmRow) -> Result<DirectMessageResponse, ApiError> {
    let mut views = dm_views(db, vec![row])?;
    views.pop().ok_or_else(|| ApiError::Internal("empty view page".into()))
}
