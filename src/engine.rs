//! Scan orchestration: QR validation, per-child state transitions, fan-out.
//!
//! A guardian's scan is one request; each linked child is processed
//! independently and concurrently, and the response itemizes every outcome.
//! Atomicity per child comes from the conditional transactional writes in
//! `db::repo` — a concurrent scan of the same child loses the race at the
//! ledger and is reported as a conflict, never double-committed.

use crate::cache::ActionCache;
use crate::clock::FacilityClock;
use crate::config::QrIssuance;
use crate::db::{self, ChildForScan, Pool, ScanGuardian};
use crate::model::{ChildStatus, ScanAction};
use crate::notify::Dispatcher;
use crate::qr::{self, QrRejection};
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{instrument, warn};

/// Request-level rejections. Per-child conflicts are not errors; they appear
/// in the itemized results instead.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{0}")]
    Validation(#[from] QrRejection),
    #[error("Not authorized as guardian.")]
    Authorization,
    #[error("Failed to process QR code.")]
    Dependency(#[source] anyhow::Error),
}

/// Outcome for one child within a scan batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildOutcome {
    pub child_id: i64,
    pub child_name: String,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ScanAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    /// True iff at least one child transitioned. Partial success is expected;
    /// consult `results` for the per-child picture.
    pub success: bool,
    pub results: Vec<ChildOutcome>,
}

pub struct Engine {
    pool: Pool,
    cache: Arc<ActionCache>,
    clock: FacilityClock,
    dispatcher: Dispatcher,
    facility_id: String,
    issuance: QrIssuance,
}

impl Engine {
    pub fn new(
        pool: Pool,
        cache: Arc<ActionCache>,
        clock: FacilityClock,
        dispatcher: Dispatcher,
        facility_id: String,
        issuance: QrIssuance,
    ) -> Self {
        Self {
            pool,
            cache,
            clock,
            dispatcher,
            facility_id,
            issuance,
        }
    }

    /// Process one scan submission for an authenticated guardian identity.
    /// The facility-local time is fixed once here so all children in the
    /// batch share an identical nominal timestamp.
    #[instrument(skip_all)]
    pub async fn process_scan(
        &self,
        guardian_id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<ScanResponse, ScanError> {
        let today = self.clock.today(now);
        qr::validate(code, &self.facility_id, self.issuance, today)?;

        let guardian = db::guardian_by_id(&self.pool, guardian_id)
            .await
            .map_err(ScanError::Dependency)?
            .ok_or(ScanError::Authorization)?;
        if guardian.role != "GUARDIAN" {
            return Err(ScanError::Authorization);
        }

        let children = db::children_of(&self.pool, guardian.id)
            .await
            .map_err(ScanError::Dependency)?;

        let formatted = self.clock.format_time(now);
        let results = join_all(
            children
                .into_iter()
                .map(|child| self.scan_child(child, &guardian, today, now, &formatted)),
        )
        .await;

        let success = results.iter().any(|r| r.accepted);
        Ok(ScanResponse { success, results })
    }

    /// Transition one child. Never fails the request: ledger trouble is
    /// reported as a rejected outcome for this child only.
    async fn scan_child(
        &self,
        child: ChildForScan,
        guardian: &ScanGuardian,
        day: NaiveDate,
        now: DateTime<Utc>,
        formatted_time: &str,
    ) -> ChildOutcome {
        if self.cache.should_reject(child.id, day, now) {
            return ChildOutcome {
                child_id: child.id,
                child_name: child.name.clone(),
                accepted: false,
                action: None,
                time: None,
                message: format!("Action for {} was performed recently.", child.name),
            };
        }

        match child.status {
            ChildStatus::Absent => {
                self.commit(ScanAction::CheckIn, child, guardian, day, now, formatted_time)
                    .await
            }
            ChildStatus::Present => {
                self.commit(ScanAction::PickUp, child, guardian, day, now, formatted_time)
                    .await
            }
            ChildStatus::PickedUp | ChildStatus::PickupRequested => ChildOutcome {
                child_id: child.id,
                child_name: child.name.clone(),
                accepted: false,
                action: None,
                time: None,
                message: format!("{} is already {}.", child.name, child.status.describe()),
            },
        }
    }

    async fn commit(
        &self,
        action: ScanAction,
        child: ChildForScan,
        guardian: &ScanGuardian,
        day: NaiveDate,
        now: DateTime<Utc>,
        formatted_time: &str,
    ) -> ChildOutcome {
        let written = match action {
            ScanAction::CheckIn => db::record_check_in(&self.pool, child.id, day, now).await,
            ScanAction::PickUp => db::record_pick_up(&self.pool, child.id, day, now).await,
        };

        match written {
            Ok(true) => {
                self.cache.record(child.id, day, action, now);
                let message = self
                    .dispatcher
                    .dispatch(action, &child, guardian, formatted_time, now)
                    .await;
                ChildOutcome {
                    child_id: child.id,
                    child_name: child.name,
                    accepted: true,
                    action: Some(action),
                    time: Some(formatted_time.to_string()),
                    message,
                }
            }
            Ok(false) => ChildOutcome {
                child_id: child.id,
                child_name: child.name.clone(),
                accepted: false,
                action: None,
                time: None,
                message: format!("Another scan already updated {}.", child.name),
            },
            Err(err) => {
                warn!(?err, child_id = child.id, "ledger write failed");
                ChildOutcome {
                    child_id: child.id,
                    child_name: child.name.clone(),
                    accepted: false,
                    action: None,
                    time: None,
                    message: format!("Could not update {} right now.", child.name),
                }
            }
        }
    }
}
