//! Read receipts and unread counts.

use rusqlite::params;
use uuid::Uuid;

use crate::models::ReceiptRow;
use crate::users::OptionalExt;
use crate::{Database, Result, now_ts, parse_ts, parse_uuid};

impl Database {
    /// High-water mark: one row per (channel, user), refreshed on every mark.
    pub fn upsert_receipt(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        last_message_id: Option<Uuid>,
    ) -> Result<()> {
        let now = now_ts();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO read_receipts (id, channel_id, user_id, last_read_at, last_message_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(channel_id, user_id) DO UPDATE SET
                    last_read_at = excluded.last_read_at,
                    last_message_id = excluded.last_message_id",
                params![
                    Uuid::new_v4().to_string(),
                    channel_id.to_string(),
                    user_id.to_string(),
                    now,
                    last_message_id.map(|m| m.to_string())
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_receipt(&self, channel_id: Uuid, user_id: Uuid) -> Result<Option<ReceiptRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT channel_id, user_id, last_read_at, last_message_id
                     FROM read_receipts WHERE channel_id = ?1 AND user_id = ?2",
                    params![channel_id.to_string(), user_id.to_string()],
                    |row| {
                        let channel: String = row.get(0)?;
                        let user: String = row.get(1)?;
                        let at: String = row.get(2)?;
                        let msg: Option<String> = row.get(3)?;
                        Ok(ReceiptRow {
                            channel_id: parse_uuid(&channel, 0)?,
                            user_id: parse_uuid(&user, 1)?,
                            last_read_at: parse_ts(&at, 2)?,
                            last_message_id: msg
                                .as_deref()
                                .map(|s| parse_uuid(s, 3))
                                .transpose()?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Unread counts for every channel the user belongs to, in one aggregate
    /// query. Messages authored by the user never count; with no receipt,
    /// every foreign message counts.
    pub fn unread_counts(&self, user_id: Uuid) -> Result<Vec<(Uuid, i64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT cm.channel_id, COUNT(m.id)
                 FROM channel_members cm
                 LEFT JOIN read_receipts rr
                    ON rr.channel_id = cm.channel_id AND rr.user_id = cm.user_id
                 LEFT JOIN messages m
                    ON m.channel_id = cm.channel_id
                   AND m.sender_id != cm.user_id
                   AND (rr.last_read_at IS NULL OR m.created_at > rr.last_read_at)
                 WHERE cm.user_id = ?1
                 GROUP BY cm.channel_id",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    let channel: String = row.get(0)?;
                    let count: i64 = row.get(1)?;
                    Ok((parse_uuid(&channel, 0)?, count))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(db: &Database) -> (Uuid, Uuid, Uuid) {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        db.create_user(a, "a@example.com", "h", None).unwrap();
        db.create_user(b, "b@example.com", "h", None).unwrap();
        let channel = db
            .create_channel(Uuid::new_v4(), "general", None, None)
            .unwrap();
        db.add_member(channel.id, a).unwrap();
        db.add_member(channel.id, b).unwrap();
        (channel.id, a, b)
    }

    #[test]
    fn no_receipt_counts_all_foreign_messages() {
        let db = Database::open_in_memory().unwrap();
        let (channel, a, b) = seed(&db);

        db.insert_message(Uuid::new_v4(), channel, b, "one", None).unwrap();
        db.insert_message(Uuid::new_v4(), channel, b, "two", None).unwrap();
        db.insert_message(Uuid::new_v4(), channel, a, "mine", None).unwrap();

        let counts = db.unread_counts(a).unwrap();
        assert_eq!(counts, vec![(channel, 2)]);
    }

    #[test]
    fn mark_read_resets_count_until_next_foreign_message() {
        let db = Database::open_in_memory().unwrap();
        let (channel, a, b) = seed(&db);

        db.insert_message(Uuid::new_v4(), channel, b, "before", None).unwrap();
        let latest = db.latest_message_id(channel).unwrap();
        db.upsert_receipt(channel, a, latest).unwrap();
        assert_eq!(db.unread_counts(a).unwrap(), vec![(channel, 0)]);

        // Own messages after the mark never count.
        db.insert_message(Uuid::new_v4(), channel, a, "mine", None).unwrap();
        assert_eq!(db.unread_counts(a).unwrap(), vec![(channel, 0)]);

        db.insert_message(Uuid::new_v4(), channel, b, "after", None).unwrap();
        assert_eq!(db.unread_counts(a).unwrap(), vec![(channel, 1)]);
    }

    #[test]
    fn receipt_upsert_keeps_one_row_per_pair() {
        let db = Database::open_in_memory().unwrap();
        let (channel, a, _b) = seed(&db);

        db.upsert_receipt(channel, a, None).unwrap();
        let first = db.get_receipt(channel, a).unwrap().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(2));
        db.upsert_receipt(channel, a, None).unwrap();
        let second = db.get_receipt(channel, a).unwrap().unwrap();
        assert!(second.last_read_at > first.last_read_at);
    }
}
