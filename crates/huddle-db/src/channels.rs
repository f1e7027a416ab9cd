use rusqlite::{Row, params};
use uuid::Uuid;

use crate::models::{ChannelRow, MemberRow};
use crate::users::OptionalExt;
use crate::{Database, Result, StoreError, now_ts, parse_ts, parse_uuid};

const CHANNEL_COLS: &str = "id, name, description, is_private, created_by, created_at";

impl Database {
    pub fn create_channel(
        &self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
        created_by: Option<Uuid>,
    ) -> Result<ChannelRow> {
        let now = now_ts();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channels (id, name, description, is_private, created_by, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5)",
                params![
                    id.to_string(),
                    name,
                    description,
                    created_by.map(|u| u.to_string()),
                    now
                ],
            )?;
            query_channel(conn, "id", &id.to_string())?.ok_or(StoreError::NotFound)
        })
    }

    pub fn get_channel(&self, id: Uuid) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| query_channel(conn, "id", &id.to_string()))
    }

    pub fn get_channel_by_name(&self, name: &str) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| query_channel(conn, "name", name))
    }

    /// Deleting a channel cascades to its messages, memberships, typing
    /// indicators and read receipts (schema-level ON DELETE CASCADE).
    pub fn delete_channel(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM channels WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(affected > 0)
        })
    }

    pub fn list_channels(&self) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {CHANNEL_COLS} FROM channels ORDER BY name ASC"))?;
            let rows = stmt
                .query_map([], row_to_channel)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn list_channels_for_user(&self, user_id: Uuid) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.description, c.is_private, c.created_by, c.created_at
                 FROM channels c
                 JOIN channel_members cm ON cm.channel_id = c.id
                 WHERE cm.user_id = ?1
                 ORDER BY c.name ASC",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], row_to_channel)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    // -- Membership --

    pub fn is_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM channel_members WHERE channel_id = ?1 AND user_id = ?2",
                    params![channel_id.to_string(), user_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn add_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<MemberRow> {
        let now = now_ts();
        let member_id = Uuid::new_v4();
        self.with_conn(|conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM channel_members WHERE channel_id = ?1 AND user_id = ?2",
                    params![channel_id.to_string(), user_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(StoreError::Conflict("already a member".into()));
            }
            conn.execute(
                "INSERT INTO channel_members (id, channel_id, user_id, joined_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    member_id.to_string(),
                    channel_id.to_string(),
                    user_id.to_string(),
                    now
                ],
            )?;
            Ok(MemberRow {
                id: member_id,
                channel_id,
                user_id,
                joined_at: crate::parse_ts(&now, 3)
                    .map_err(StoreError::Sqlite)?,
            })
        })
    }

    /// Bulk backfill used on channel creation; existing memberships are kept.
    pub fn add_members_bulk(&self, channel_id: Uuid, user_ids: &[Uuid]) -> Result<usize> {
        let now = now_ts();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut added = 0;
            for user_id in user_ids {
                added += tx.execute(
                    "INSERT OR IGNORE INTO channel_members (id, channel_id, user_id, joined_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        Uuid::new_v4().to_string(),
                        channel_id.to_string(),
                        user_id.to_string(),
                        now
                    ],
                )?;
            }
            tx.commit()?;
            Ok(added)
        })
    }

    pub fn remove_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM channel_members WHERE channel_id = ?1 AND user_id = ?2",
                params![channel_id.to_string(), user_id.to_string()],
            )?;
            Ok(affected > 0)
        })
    }

    pub fn list_members(&self, channel_id: Uuid) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, channel_id, user_id, joined_at
                 FROM channel_members
                 WHERE channel_id = ?1
                 ORDER BY joined_at ASC",
            )?;
            let rows = stmt
                .query_map([channel_id.to_string()], row_to_member)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn query_channel(conn: &rusqlite::Connection, col: &str, value: &str) -> Result<Option<ChannelRow>> {
    let sql = format!("SELECT {CHANNEL_COLS} FROM channels WHERE {col} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], row_to_channel).optional()?;
    Ok(row)
}

fn row_to_channel(row: &Row<'_>) -> rusqlite::Result<ChannelRow> {
    let id: String = row.get(0)?;
    let created_by: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;

    Ok(ChannelRow {
        id: parse_uuid(&id, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_private: row.get(3)?,
        created_by: created_by.as_deref().map(|s| parse_uuid(s, 4)).transpose()?,
        created_at: parse_ts(&created_at, 5)?,
    })
}

fn row_to_member(row: &Row<'_>) -> rusqlite::Result<MemberRow> {
    let id: String = row.get(0)?;
    let channel_id: String = row.get(1)?;
    let user_id: String = row.get(2)?;
    let joined_at: String = row.get(3)?;

    Ok(MemberRow {
        id: parse_uuid(&id, 0)?,
        channel_id: parse_uuid(&channel_id, 1)?,
        user_id: parse_uuid(&user_id, 2)?,
        joined_at: parse_ts(&joined_at, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_user(db: &Database, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(id, email, "h", None).unwrap();
        id
    }

    #[test]
    fn membership_is_unique_per_pair() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "a@example.com");
        let channel = db
            .create_channel(Uuid::new_v4(), "general", None, None)
            .unwrap();

        db.add_member(channel.id, user).unwrap();
        let err = db.add_member(channel.id, user);
        assert!(matches!(err, Err(StoreError::Conflict(_))));
        assert_eq!(db.list_members(channel.id).unwrap().len(), 1);
    }

    #[test]
    fn bulk_backfill_skips_existing() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a@example.com");
        let b = seed_user(&db, "b@example.com");
        let channel = db
            .create_channel(Uuid::new_v4(), "general", None, None)
            .unwrap();

        db.add_member(channel.id, a).unwrap();
        let added = db.add_members_bulk(channel.id, &[a, b]).unwrap();
        assert_eq!(added, 1);
        assert_eq!(db.list_members(channel.id).unwrap().len(), 2);
    }

    #[test]
    fn delete_channel_cascades_members() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a@example.com");
        let channel = db
            .create_channel(Uuid::new_v4(), "doomed", None, None)
            .unwrap();
        db.add_member(channel.id, a).unwrap();

        assert!(db.delete_channel(channel.id).unwrap());
        assert!(db.get_channel(channel.id).unwrap().is_none());
        assert!(db.list_members(channel.id).unwrap().is_empty());
    }
}
