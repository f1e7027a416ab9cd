//! Typed row structs returned by the query layer.
//!
//! Distinct from the huddle-types API DTOs: these carry exactly what a query
//! produced (joins included), and the API layer decides what to expose.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub status: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChannelRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

/// A channel message joined with its sender identity.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub seq: i64,
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    pub sender_email: String,
    pub sender_full_name: Option<String>,
    pub content: String,
    pub reply_to_id: Option<Uuid>,
    pub is_edited: bool,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A direct message joined with both party identities.
#[derive(Debug, Clone)]
pub struct DmRow {
    pub seq: i64,
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_email: String,
    pub sender_full_name: Option<String>,
    pub recipient_id: Uuid,
    pub recipient_email: String,
    pub recipient_full_name: Option<String>,
    pub content: String,
    pub reply_to_id: Option<Uuid>,
    pub is_edited: bool,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shallow reply target: just enough to render a quote line.
#[derive(Debug, Clone)]
pub struct ReplyRow {
    pub id: Uuid,
    pub content: String,
    pub sender_id: Uuid,
    pub sender_email: String,
    pub sender_full_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReactionRow {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
}

#[derive(Debug, Clone)]
pub struct AttachmentRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub data_url: String,
    pub mime_type: String,
    pub size: i64,
}

#[derive(Debug, Clone)]
pub struct TypingUserRow {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReceiptRow {
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub last_read_at: DateTime<Utc>,
    pub last_message_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct PushSubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}
