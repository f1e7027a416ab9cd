//! Typing indicators: ephemeral, advisory. A row is live while its
//! `updated_at` is inside the recency window; rows past the expiry window
//! are garbage-collected opportunistically whenever someone reads.

use rusqlite::params;
use uuid::Uuid;

use crate::models::TypingUserRow;
use crate::{Database, Result, now_ts, parse_uuid};

impl Database {
    pub fn upsert_typing(&self, channel_id: Uuid, user_id: Uuid) -> Result<()> {
        let now = now_ts();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO typing_indicators (id, channel_id, user_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(channel_id, user_id) DO UPDATE SET updated_at = excluded.updated_at",
                params![
                    Uuid::new_v4().to_string(),
                    channel_id.to_string(),
                    user_id.to_string(),
                    now
                ],
            )?;
            Ok(())
        })
    }

    /// Users typing in the channel since `cutoff`, excluding the caller.
    pub fn typing_users(
        &self,
        channel_id: Uuid,
        exclude_user: Uuid,
        cutoff: &str,
    ) -> Result<Vec<TypingUserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.email, u.full_name
                 FROM typing_indicators t
                 JOIN users u ON u.id = t.user_id
                 WHERE t.channel_id = ?1 AND t.updated_at > ?2 AND t.user_id != ?3",
            )?;
            let rows = stmt
                .query_map(
                    params![channel_id.to_string(), cutoff, exclude_user.to_string()],
                    |row| {
                        let id: String = row.get(0)?;
                        Ok(TypingUserRow {
                            id: parse_uuid(&id, 0)?,
                            email: row.get(1)?,
                            full_name: row.get(2)?,
                        })
                    },
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Delete indicators not refreshed since `cutoff`. Nothing guarantees
    /// this ever runs if nobody polls; acceptable for advisory state.
    pub fn prune_typing(&self, cutoff: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM typing_indicators WHERE updated_at < ?1",
                [cutoff],
            )?;
            Ok(affected)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn seed(db: &Database) -> (Uuid, Uuid, Uuid) {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        db.create_user(a, "a@example.com", "h", None).unwrap();
        db.create_user(b, "b@example.com", "h", None).unwrap();
        let channel = db
            .create_channel(Uuid::new_v4(), "general", None, None)
            .unwrap();
        (channel.id, a, b)
    }

    #[test]
    fn typing_excludes_caller_and_stale_rows() {
        let db = Database::open_in_memory().unwrap();
        let (channel, a, b) = seed(&db);

        db.upsert_typing(channel, a).unwrap();
        db.upsert_typing(channel, b).unwrap();

        let cutoff = crate::format_ts(Utc::now() - Duration::seconds(5));
        let seen_by_a = db.typing_users(channel, a, &cutoff).unwrap();
        assert_eq!(seen_by_a.len(), 1);
        assert_eq!(seen_by_a[0].id, b);

        // A cutoff in the future makes everything stale.
        let future = crate::format_ts(Utc::now() + Duration::seconds(1));
        assert!(db.typing_users(channel, a, &future).unwrap().is_empty());
    }

    #[test]
    fn upsert_refreshes_single_row() {
        let db = Database::open_in_memory().unwrap();
        let (channel, a, b) = seed(&db);

        db.upsert_typing(channel, b).unwrap();
        db.upsert_typing(channel, b).unwrap();

        let cutoff = crate::format_ts(Utc::now() - Duration::seconds(5));
        assert_eq!(db.typing_users(channel, a, &cutoff).unwrap().len(), 1);

        let pruned = db.prune_typing(&crate::format_ts(Utc::now() + Duration::seconds(1))).unwrap();
        assert_eq!(pruned, 1);
    }
}
