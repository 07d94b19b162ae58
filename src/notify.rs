//! Notification fan-out for committed transitions.
//!
//! One committed check-in or pick-up produces: a persisted notification row,
//! a refreshed feed pushed to live subscribers, and a best-effort SMS to the
//! guardian. None of these can fail or roll back the transition itself.

use crate::db::{self, ChildForScan, Pool, ScanGuardian};
use crate::model::{Notification, ScanAction};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Outbound SMS collaborator. Implementations must be bounded, short-lived
/// I/O; delivery is best-effort and never awaited for correctness.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, message: &str) -> Result<bool>;
}

/// SMS gateway client speaking a simple JSON POST protocol.
#[derive(Clone)]
pub struct HttpSmsSender {
    http: Client,
    api_url: String,
    api_token: String,
    sender: String,
}

impl fmt::Debug for HttpSmsSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSmsSender")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl HttpSmsSender {
    pub fn from_config(cfg: &crate::config::Sms) -> Self {
        let http = Client::builder()
            .user_agent("rollcall/0.1")
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_url: cfg.api_url.clone(),
            api_token: cfg.api_token.clone(),
            sender: cfg.sender.clone(),
        }
    }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send(&self, to: &str, message: &str) -> Result<bool> {
        let res = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .json(&json!({ "from": self.sender, "to": to, "message": message }))
            .send()
            .await
            .context("failed to reach SMS gateway")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("sms gateway error {}: {}", status, body));
        }
        Ok(true)
    }
}

/// Fan-out point for live dashboard subscribers. Publishes the full current
/// feed on every change; subscribers that are not connected miss the event
/// and resync through the pull endpoint.
#[derive(Debug)]
pub struct NotificationHub {
    tx: broadcast::Sender<Vec<Notification>>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<Notification>> {
        self.tx.subscribe()
    }

    pub fn publish(&self, feed: Vec<Notification>) {
        // A send with no live subscribers is not an error.
        let _ = self.tx.send(feed);
    }
}

pub struct Dispatcher {
    pool: Pool,
    hub: Arc<NotificationHub>,
    sms: Option<Arc<dyn SmsSender>>,
}

impl Dispatcher {
    pub fn new(pool: Pool, hub: Arc<NotificationHub>, sms: Option<Arc<dyn SmsSender>>) -> Self {
        Self { pool, hub, sms }
    }

    /// Build the guardian-facing message for a committed transition and fan
    /// it out. Returns the message; every failure inside is logged and
    /// swallowed so the already-committed transition stands.
    #[instrument(skip_all, fields(child_id = child.id, action = action.as_str()))]
    pub async fn dispatch(
        &self,
        action: ScanAction,
        child: &ChildForScan,
        guardian: &ScanGuardian,
        formatted_time: &str,
        at: DateTime<Utc>,
    ) -> String {
        let message = match action {
            ScanAction::CheckIn => {
                format!("{} has been checked in at {}.", child.name, formatted_time)
            }
            ScanAction::PickUp => {
                format!("{} has been picked up at {}.", child.name, formatted_time)
            }
        };

        let note = Notification {
            id: Uuid::new_v4().to_string(),
            kind: action,
            message: message.clone(),
            read: false,
            created_at: at,
            child_id: child.id,
            guardian_id: guardian.id,
        };

        match db::insert_notification(&self.pool, &note).await {
            Ok(()) => match db::list_notifications(&self.pool, None).await {
                Ok(feed) => self.hub.publish(feed),
                Err(err) => warn!(?err, "failed to refresh notification feed"),
            },
            Err(err) => warn!(?err, "failed to persist notification"),
        }

        if let (Some(sms), Some(phone)) = (self.sms.as_ref(), guardian.phone.as_deref()) {
            let sms = Arc::clone(sms);
            let to = phone.to_string();
            let body = message.clone();
            tokio::spawn(async move {
                match sms.send(&to, &body).await {
                    Ok(_) => info!("sms delivered"),
                    Err(err) => warn!(?err, "sms delivery failed"),
                }
            });
        }

        message
    }
}
