//! Direct message queries. A conversation is the unordered pair of
//! participant ids; there is no channel row behind it.

use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use crate::messages::{INITIAL_FETCH_LIMIT, POLL_FETCH_LIMIT, batch_reply_previews};
use crate::models::{DmRow, ReplyRow};
use crate::users::OptionalExt;
use crate::{Database, Result, StoreError, now_ts, parse_ts, parse_uuid};

const DM_SELECT: &str = "SELECT m.seq, m.id, m.sender_id, s.email, s.full_name,
            m.recipient_id, r.email, r.full_name,
            m.content, m.reply_to_id, m.is_edited, m.is_read, m.created_at, m.updated_at
     FROM direct_messages m
     JOIN users s ON s.id = m.sender_id
     JOIN users r ON r.id = m.recipient_id";

impl Database {
    pub fn insert_dm(
        &self,
        id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
        content: &str,
        reply_to_id: Option<Uuid>,
    ) -> Result<DmRow> {
        let now = now_ts();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO direct_messages (id, sender_id, recipient_id, content, reply_to_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id.to_string(),
                    sender_id.to_string(),
                    recipient_id.to_string(),
                    content,
                    reply_to_id.map(|r| r.to_string()),
                    now
                ],
            )?;
            query_dm(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn insert_dm_with_attachment(
        &self,
        id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
        content: &str,
        filename: &str,
        data_url: &str,
        mime_type: &str,
        size: i64,
    ) -> Result<DmRow> {
        let now = now_ts();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO direct_messages (id, sender_id, recipient_id, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    id.to_string(),
                    sender_id.to_string(),
                    recipient_id.to_string(),
                    content,
                    now
                ],
            )?;
            tx.execute(
                "INSERT INTO attachments (id, dm_id, filename, data_url, mime_type, size, created_at)
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
            query_dm(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    pub fn get_dm(&self, id: Uuid) -> Result<Option<DmRow>> {
        self.with_conn(|conn| query_dm(conn, id))
    }

    /// Both directions of the (me, peer) pair, ascending by `seq`.
    pub fn list_dms(&self, me: Uuid, peer: Uuid, after: Option<i64>) -> Result<Vec<DmRow>> {
        self.with_conn(|conn| {
            let pair = "((m.sender_id = ?1 AND m.recipient_id = ?2)
                      OR (m.sender_id = ?2 AND m.recipient_id = ?1))";
            match after {
                Some(cursor) => {
                    let sql = format!(
                        "{DM_SELECT} WHERE {pair} AND m.seq > ?3 ORDER BY m.seq ASC LIMIT ?4"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map(
                            params![me.to_string(), peer.to_string(), cursor, POLL_FETCH_LIMIT],
                            row_to_dm,
                        )?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(rows)
                }
                None => {
                    let sql = format!(
                        "SELECT * FROM ({DM_SELECT} WHERE {pair}
                         ORDER BY m.seq DESC LIMIT ?3) ORDER BY seq ASC"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map(
                            params![me.to_string(), peer.to_string(), INITIAL_FETCH_LIMIT],
                            row_to_dm,
                        )?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(rows)
                }
            }
        })
    }

    pub fn edit_dm(&self, id: Uuid, content: &str) -> Result<DmRow> {
        let now = now_ts();
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE direct_messages SET content = ?2, is_edited = 1, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), content, now],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }
            query_dm(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    pub fn delete_dm(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected =
                conn.execute("DELETE FROM direct_messages WHERE id = ?1", [id.to_string()])?;
            Ok(affected > 0)
        })
    }

    /// Flag everything the peer sent me as read. Best-effort side effect of
    /// listing a conversation.
    pub fn mark_dms_read(&self, me: Uuid, peer: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE direct_messages SET is_read = 1
                 WHERE recipient_id = ?1 AND sender_id = ?2 AND is_read = 0",
                params![me.to_string(), peer.to_string()],
            )?;
            Ok(affected)
        })
    }

    pub fn dm_reply_previews(&self, ids: &[Uuid]) -> Result<Vec<ReplyRow>> {
        self.with_conn(|conn| batch_reply_previews(conn, "direct_messages", ids))
    }
}

fn query_dm(conn: &Connection, id: Uuid) -> Result<Option<DmRow>> {
    let sql = format!("{DM_SELECT} WHERE m.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id.to_string()], row_to_dm).optional()?;
    Ok(row)
}

fn row_to_dm(row: &Row<'_>) -> rusqlite::Result<DmRow> {
    let id: String = row.get(1)?;
    let sender_id: String = row.get(2)?;
    let recipient_id: String = row.get(5)?;
    let reply_to: Option<String> = row.get(9)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(DmRow {
        seq: row.get(0)?,
        id: parse_uuid(&id, 1)?,
        sender_id: parse_uuid(&sender_id, 2)?,
        sender_email: row.get(3)?,
        sender_full_name: row.get(4)?,
        recipient_id: parse_uuid(&recipient_id, 5)?,
        recipient_email: row.get(6)?,
        recipient_full_name: row.get(7)?,
        content: row.get(8)?,
        reply_to_id: reply_to.as_deref().map(|s| parse_uuid(s, 9)).transpose()?,
        is_edited: row.get(10)?,
        is_read: row.get(11)?,
        created_at: parse_ts(&created_at, 12)?,
        updated_at: parse_ts(&updated_at, 13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_users(db: &Database) -> (Uuid, Uuid) {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        db.create_user(a, "a@example.com", "h", None).unwrap();
        db.create_user(b, "b@example.com", "h", None).unwrap();
        (a, b)
    }

    #[test]
    fn conversation_is_symmetric() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = two_users(&db);
        db.insert_dm(Uuid::new_v4(), a, b, "hi", None).unwrap();
        db.insert_dm(Uuid::new_v4(), b, a, "hello", None).unwrap();

        let from_a = db.list_dms(a, b, None).unwrap();
        let from_b = db.list_dms(b, a, None).unwrap();
        assert_eq!(from_a.len(), 2);
        assert_eq!(from_b.len(), 2);
        assert_eq!(from_a[0].content, "hi");
        assert_eq!(from_a[1].content, "hello");
    }

    #[test]
    fn third_parties_see_nothing() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = two_users(&db);
        let c = Uuid::new_v4();
        db.create_user(c, "c@example.com", "h", None).unwrap();
        db.insert_dm(Uuid::new_v4(), a, b, "secret", None).unwrap();

        assert!(db.list_dms(c, a, None).unwrap().is_empty());
        assert!(db.list_dms(c, b, None).unwrap().is_empty());
    }

    #[test]
    fn mark_read_flags_only_incoming() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = two_users(&db);
        let incoming = db.insert_dm(Uuid::new_v4(), b, a, "for you", None).unwrap();
        let outgoing = db.insert_dm(Uuid::new_v4(), a, b, "for them", None).unwrap();
        assert!(!incoming.is_read);

        let flagged = db.mark_dms_read(a, b).unwrap();
        assert_eq!(flagged, 1);
        assert!(db.get_dm(incoming.id).unwrap().unwrap().is_read);
        assert!(!db.get_dm(outgoing.id).unwrap().unwrap().is_read);
    }
}
