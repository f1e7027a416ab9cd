//! Best-effort push notification dispatch.
//!
//! The dispatcher looks up the stored push endpoints of the target users and
//! POSTs the JSON payload to each one independently. It never returns an
//! error: a failed delivery is logged, a delivery the push service reports
//! as permanently gone (404/410) prunes that subscription row, and the
//! caller's primary operation is unaffected either way. Without VAPID
//! configuration the whole thing is a no-op returning `false`.
//!
//! Protocol-level Web Push concerns (VAPID signing, payload encryption) are
//! delegated to the receiving relay; this side only speaks HTTPS.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use huddle_db::Database;

/// VAPID key material plus the administrative contact address. All three
/// must be present for dispatch to be enabled.
#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub public_key: String,
    pub private_key: String,
    pub contact: String,
}

impl VapidConfig {
    /// Read `HUDDLE_VAPID_PUBLIC_KEY`, `HUDDLE_VAPID_PRIVATE_KEY` and
    /// `HUDDLE_VAPID_CONTACT`; any of them missing disables push entirely.
    pub fn from_env() -> Option<Self> {
        let public_key = std::env::var("HUDDLE_VAPID_PUBLIC_KEY").ok()?;
        let private_key = std::env::var("HUDDLE_VAPID_PRIVATE_KEY").ok()?;
        let contact = std::env::var("HUDDLE_VAPID_CONTACT").ok()?;
        Some(Self {
            public_key,
            private_key,
            contact,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub url: String,
    pub tag: String,
}

impl NotificationPayload {
    pub fn new(title: &str, body: &str, url: Option<&str>, tag: Option<&str>) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            url: url.unwrap_or("/").to_string(),
            tag: tag.unwrap_or("huddle-chat").to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    config: Option<VapidConfig>,
}

impl Dispatcher {
    pub fn new(config: Option<VapidConfig>) -> Self {
        if config.is_none() {
            warn!("VAPID keys not configured, push notifications disabled");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Fan out `payload` to every endpoint of every target user.
    ///
    /// Returns `true` when dispatch ran (even if individual deliveries
    /// failed), `false` when it is disabled or the subscription lookup
    /// itself failed.
    pub async fn notify(
        &self,
        db: &Arc<Database>,
        user_ids: &[Uuid],
        payload: NotificationPayload,
    ) -> bool {
        let Some(config) = &self.config else {
            return false;
        };

        let ids = user_ids.to_vec();
        let lookup = {
            let db = db.clone();
            tokio::task::spawn_blocking(move || db.push_subscriptions_for_users(&ids)).await
        };
        let subscriptions = match lookup {
            Ok(Ok(subs)) => subs,
            Ok(Err(e)) => {
                warn!("push subscription lookup failed: {e}");
                return false;
            }
            Err(e) => {
                warn!("push subscription lookup join error: {e}");
                return false;
            }
        };

        debug!(
            count = subscriptions.len(),
            title = %payload.title,
            "dispatching push notifications"
        );

        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(e) => {
                warn!("push payload serialization failed: {e}");
                return false;
            }
        };

        let deliveries = subscriptions.into_iter().map(|sub| {
            let client = self.client.clone();
            let body = body.clone();
            let db = db.clone();
            let public_key = config.public_key.clone();
            let contact = config.contact.clone();
            async move {
                let result = client
                    .post(&sub.endpoint)
                    .header("Content-Type", "application/json")
                    .header("TTL", "86400")
                    .header("X-Vapid-Public-Key", public_key)
                    .header("X-Vapid-Contact", contact)
                    .body(body)
                    .send()
                    .await;

                match result {
                    Ok(resp)
                        if resp.status() == reqwest::StatusCode::NOT_FOUND
                            || resp.status() == reqwest::StatusCode::GONE =>
                    {
                        // Endpoint permanently dead; prune the row.
                        debug!(endpoint = %sub.endpoint, "pruning dead push endpoint");
                        let sub_id = sub.id;
                        let prune = tokio::task::spawn_blocking(move || {
                            db.delete_push_subscription_by_id(sub_id)
                        })
                        .await;
                        if let Ok(Err(e)) = prune {
                            warn!("failed to prune push subscription: {e}");
                        }
                    }
                    Ok(resp) if !resp.status().is_success() => {
                        warn!(endpoint = %sub.endpoint, status = %resp.status(), "push delivery rejected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(endpoint = %sub.endpoint, "push delivery failed: {e}");
                    }
                }
            }
        });

        // One failed delivery must not abort the others.
        join_all(deliveries).await;
        true
    }
}
