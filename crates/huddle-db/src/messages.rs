//! Channel message queries.
//!
//! `seq` (the SQLite AUTOINCREMENT rowid) is the poll cursor: fetching with
//! `after = Some(n)` returns exactly the rows with `seq > n` in ascending
//! order, so a polling client advancing its cursor to the last `seq` it saw
//! never sees a duplicate and never skips a row.

use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use crate::models::{MessageRow, ReplyRow};
use crate::users::OptionalExt;
use crate::{Database, Result, StoreError, now_ts, parse_ts, parse_uuid};

/// Page size without a cursor (initial fetch).
pub const INITIAL_FETCH_LIMIT: u32 = 100;
/// Page size when polling with a cursor.
pub const POLL_FETCH_LIMIT: u32 = 50;

const MESSAGE_SELECT: &str = "SELECT m.seq, m.id, m.channel_id, m.sender_id, u.email, u.full_name,
            m.content, m.reply_to_id, m.is_edited, m.is_pinned, m.created_at, m.updated_at
     FROM messages m
     JOIN users u ON u.id = m.sender_id";

impl Database {
    pub fn insert_message(
        &self,
        id: Uuid,
        channel_id: Uuid,
        sender_id: Uuid,
        content: &str,
        reply_to_id: Option<Uuid>,
    ) -> Result<MessageRow> {
        let now = now_ts();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, channel_id, sender_id, content, reply_to_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id.to_string(),
                    channel_id.to_string(),
                    sender_id.to_string(),
                    content,
                    reply_to_id.map(|r| r.to_string()),
                    now
                ],
            )?;
            query_message(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    /// Insert a message and its attachment in one transaction. The upload
    /// endpoint must never leave an attachment-less placeholder behind.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_message_with_attachment(
        &self,
        id: Uuid,
        channel_id: Uuid,
        sender_id: Uuid,
        content: &str,
        filename: &str,
        data_url: &str,
        mime_type: &str,
        size: i64,
    ) -> Result<MessageRow> {
        let now = now_ts();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (id, channel_id, sender_id, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    id.to_string(),
                    channel_id.to_string(),
                    sender_id.to_string(),
                    content,
                    now
                ],
            )?;
            tx.execute(
                "INSERT INTO attachments (id, message_id, filename, data_url, mime_type, size, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    Uuid::new_v4().to_string(),
                    id.to_string(),
                    filename,
                    data_url,
                    mime_type,
                    size,
                    now
                ],
            )?;
            tx.commit()?;
            query_message(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    pub fn list_channel_messages(
        &self,
        channel_id: Uuid,
        after: Option<i64>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| match after {
            Some(cursor) => {
                let sql = format!(
                    "{MESSAGE_SELECT} WHERE m.channel_id = ?1 AND m.seq > ?2
                     ORDER BY m.seq ASC LIMIT ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(
                        params![channel_id.to_string(), cursor, POLL_FETCH_LIMIT],
                        row_to_message,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            }
            None => {
                // Latest N, returned ascending.
                let sql = format!(
                    "SELECT * FROM ({MESSAGE_SELECT} WHERE m.channel_id = ?1
                     ORDER BY m.seq DESC LIMIT ?2) ORDER BY seq ASC"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(
                        params![channel_id.to_string(), INITIAL_FETCH_LIMIT],
                        row_to_message,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            }
        })
    }

    pub fn edit_message(&self, id: Uuid, content: &str) -> Result<MessageRow> {
        let now = now_ts();
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE messages SET content = ?2, is_edited = 1, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), content, now],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }
            query_message(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    pub fn delete_message(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM messages WHERE id = ?1", [id.to_string()])?;
            Ok(affected > 0)
        })
    }

    pub fn set_pinned(&self, id: Uuid, pinned: bool, pinned_by: Option<Uuid>) -> Result<MessageRow> {
        let now = now_ts();
        self.with_conn(|conn| {
            let affected = if pinned {
                conn.execute(
                    "UPDATE messages SET is_pinned = 1, pinned_at = ?2, pinned_by = ?3 WHERE id = ?1",
                    params![id.to_string(), now, pinned_by.map(|u| u.to_string())],
                )?
            } else {
                conn.execute(
                    "UPDATE messages SET is_pinned = 0, pinned_at = NULL, pinned_by = NULL WHERE id = ?1",
                    [id.to_string()],
                )?
            };
            if affected == 0 {
                return Err(StoreError::NotFound);
            }
            query_message(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    pub fn list_pinned_messages(&self, channel_id: Uuid) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{MESSAGE_SELECT} WHERE m.channel_id = ?1 AND m.is_pinned = 1
                 ORDER BY m.pinned_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([channel_id.to_string()], row_to_message)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn latest_message_id(&self, channel_id: Uuid) -> Result<Option<Uuid>> {
        self.with_conn(|conn| {
            let id: Option<String> = conn
                .query_row(
                    "SELECT id FROM messages WHERE channel_id = ?1 ORDER BY seq DESC LIMIT 1",
                    [channel_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id.as_deref().map(|s| parse_uuid(s, 0)).transpose()?)
        })
    }

    /// Batch-fetch reply targets for a page of messages.
    pub fn reply_previews(&self, ids: &[Uuid]) -> Result<Vec<ReplyRow>> {
        self.with_conn(|conn| {
            batch_reply_previews(conn, "messages", ids)
        })
    }
}

pub(crate) fn batch_reply_previews(
    conn: &Connection,
    table: &str,
    ids: &[Uuid],
) -> Result<Vec<ReplyRow>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT m.id, m.content, m.sender_id, u.email, u.full_name
         FROM {table} m
         JOIN users u ON u.id = m.sender_id
         WHERE m.id IN ({})",
        placeholders.join(", ")
    );

    let id_strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = id_strings
        .iter()
        .map(|id| id as &dyn rusqlite::types::ToSql)
        .collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let id: String = row.get(0)?;
            let sender_id: String = row.get(2)?;
            Ok(ReplyRow {
                id: parse_uuid(&id, 0)?,
                content: row.get(1)?,
                sender_id: parse_uuid(&sender_id, 2)?,
                sender_email: row.get(3)?,
                sender_full_name: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

fn query_message(conn: &Connection, id: Uuid) -> Result<Option<MessageRow>> {
    let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row([id.to_string()], row_to_message)
        .optional()?;
    Ok(row)
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    let id: String = row.get(1)?;
    let channel_id: String = row.get(2)?;
    let sender_id: String = row.get(3)?;
    let reply_to: Option<String> = row.get(7)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(MessageRow {
        seq: row.get(0)?,
        id: parse_uuid(&id, 1)?,
        channel_id: parse_uuid(&channel_id, 2)?,
        sender_id: parse_uuid(&sender_id, 3)?,
        sender_email: row.get(4)?,
        sender_full_name: row.get(5)?,
        content: row.get(6)?,
        reply_to_id: reply_to.as_deref().map(|s| parse_uuid(s, 7)).transpose()?,
        is_edited: row.get(8)?,
        is_pinned: row.get(9)?,
        created_at: parse_ts(&created_at, 10)?,
        updated_at: parse_ts(&updated_at, 11)?,
    })
}
