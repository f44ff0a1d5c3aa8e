use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use rbd_types::models::{Cooldown, UserId};

use crate::error::{CoreError, CoreResult};
use crate::store::{ConditionalInsert, CooldownStore};
use crate::sweeper::Sweeper;

/// Rate-limit windows keyed by ordered (initiator, target) pair.
///
/// At most one window per pair is active at any instant: `create` goes
/// through the store's atomic conditional insert, so a concurrent second
/// create observes the first window instead of adding another.
#[derive(Clone)]
pub struct CooldownLedger {
    store: Arc<dyn CooldownStore>,
}

impl CooldownLedger {
    pub fn new(store: Arc<dyn CooldownStore>) -> Self {
        Self { store }
    }

    pub fn check_active(&self, initiator: UserId, target: UserId) -> CoreResult<Option<Cooldown>> {
        Ok(self.store.active_cooldown(initiator, target, crate::now())?)
    }

    /// Opens a window of `minutes` starting now. Fails with `CooldownActive`
    /// carrying the existing window's expiry if one is still open.
    pub fn create(&self, initiator: UserId, target: UserId, minutes: i64) -> CoreResult<Cooldown> {
        if minutes < 1 {
            return Err(CoreError::Validation(format!(
                "cooldown must be at least 1 minute, got {}",
                minutes
            )));
        }

        let now = crate::now();
        let record = Cooldown {
            id: Uuid::new_v4(),
            initiator,
            target,
            triggered_at: now,
            expires_at: now + TimeDelta::minutes(minutes),
        };

        match self.store.insert_cooldown_if_idle(&record)? {
            ConditionalInsert::Inserted => {
                debug!(
                    "Cooldown {} -> {} open until {}",
                    initiator, target, record.expires_at
                );
                Ok(record)
            }
            ConditionalInsert::Existing(active) => Err(CoreError::CooldownActive {
                available_at: active.expires_at,
            }),
        }
    }

    /// Re-times the active window to `triggered_at + minutes`, keeping its
    /// start. Returns false without writing if no window is active.
    pub fn reconfigure_active(&self, initiator: UserId, target: UserId, minutes: i64) -> CoreResult<bool> {
        let Some(active) = self.check_active(initiator, target)? else {
            return Ok(false);
        };

        let expires_at = active.triggered_at + TimeDelta::minutes(minutes);
        let updated = self.store.set_cooldown_expiry(active.id, expires_at)?;
        if updated {
            debug!(
                "Cooldown {} -> {} re-timed to {} minutes (until {})",
                initiator, target, minutes, expires_at
            );
        }
        Ok(updated)
    }

    /// Deletes windows that have already closed. Reads never need this,
    /// since closed windows are filtered out by `expires_at > now`.
    pub fn sweep_expired(&self) -> CoreResult<usize> {
        Ok(self.store.delete_expired_cooldowns(crate::now())?)
    }

    /// Runs `sweep_expired` every `period` until the returned handle is shut
    /// down.
    pub fn start_sweeper(&self, period: Duration) -> Sweeper {
        let ledger = self.clone();
        Sweeper::spawn("cooldown", period, move || {
            let ledger = ledger.clone();
            async move {
                match ledger.sweep_expired() {
                    Ok(0) => {}
                    Ok(count) => info!("Cooldown sweep: removed {} expired windows", count),
                    Err(e) => warn!("Cooldown sweep error: {}", e),
                }
            }
        })
    }
}

/// Seconds left until `expires_at`, never negative.
pub fn remaining_secs(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expires_at - now).num_seconds().max(0)
}
