use rusqlite::params;
use uuid::Uuid;

use crate::models::PushSubscriptionRow;
use crate::{Database, Result, now_ts, parse_uuid};

impl Database {
    /// One row per (user, endpoint); re-subscribing refreshes the keys.
    pub fn upsert_push_subscription(
        &self,
        user_id: Uuid,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO push_subscriptions (id, user_id, endpoint, p256dh, auth, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id, endpoint) DO UPDATE SET
                    p256dh = excluded.p256dh,
                    auth = excluded.auth",
                params![
                    Uuid::new_v4().to_string(),
                    user_id.to_string(),
                    endpoint,
                    p256dh,
                    auth,
                    now_ts()
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete_push_subscription(&self, user_id: Uuid, endpoint: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM push_subscriptions WHERE user_id = ?1 AND endpoint = ?2",
                params![user_id.to_string(), endpoint],
            )?;
            Ok(affected > 0)
        })
    }

    /// Used by the dispatcher after a push service reports the endpoint gone.
    pub fn delete_push_subscription_by_id(&self, id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM push_subscriptions WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(())
        })
    }

    pub fn push_subscriptions_for_users(&self, user_ids: &[Uuid]) -> Result<Vec<PushSubscriptionRow>> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=user_ids.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT id, user_id, endpoint, p256dh, auth
                 FROM push_subscriptions WHERE user_id IN ({})",
                placeholders.join(", ")
            );

            let id_strings: Vec<String> = user_ids.iter().map(|id| id.to_string()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::types::ToSql> = id_strings
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(param_refs.as_slice(), |row| {
                    let id: String = row.get(0)?;
                    let user_id: String = row.get(1)?;
                    Ok(PushSubscriptionRow {
                        id: parse_uuid(&id, 0)?,
                        user_id: parse_uuid(&user_id, 1)?,
                        endpoint: row.get(2)?,
                        p256dh: row.get(3)?,
                        auth: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_unique_per_user_endpoint() {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        db.create_user(user, "a@example.com", "h", None).unwrap();

        db.upsert_push_subscription(user, "https://push.example/ep1", "k1", "a1")
            .unwrap();
        db.upsert_push_subscription(user, "https://push.example/ep1", "k2", "a2")
            .unwrap();
        db.upsert_push_subscription(user, "https://push.example/ep2", "k3", "a3")
            .unwrap();

        let subs = db.push_subscriptions_for_users(&[user]).unwrap();
        assert_eq!(subs.len(), 2);
        let ep1 = subs
            .iter()
            .find(|s| s.endpoint == "https://push.example/ep1")
            .unwrap();
        assert_eq!(ep1.p256dh, "k2");

        assert!(db
            .delete_push_subscription(user, "https://push.example/ep2")
            .unwrap());
        assert_eq!(db.push_subscriptions_for_users(&[user]).unwrap().len(), 1);
    }
}
