use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use rbd_types::events::PushEvent;
use rbd_types::models::{Cooldown, FriendshipStatus, History, UserId};

use crate::cooldown::CooldownLedger;
use crate::error::{CoreError, CoreResult};
use crate::role;
use crate::store::{PushDispatcher, Stores};

/// What happened to the history entry for a committed trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOutcome {
    Recorded,
    Failed(String),
}

/// What happened to the push notification for a committed trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    /// The target has never registered a device.
    NoDeliveryToken,
    Failed(String),
}

/// A committed trigger. The cooldown is always written; the two side effects
/// are best effort and reported separately.
#[derive(Debug, Clone)]
pub struct TriggerOutcome {
    pub cooldown: Cooldown,
    pub next_available_at: DateTime<Utc>,
    pub history: HistoryOutcome,
    pub dispatch: DispatchOutcome,
}

impl TriggerOutcome {
    pub fn history_recorded(&self) -> bool {
        self.history == HistoryOutcome::Recorded
    }

    pub fn notification_sent(&self) -> bool {
        self.dispatch == DispatchOutcome::Sent
    }
}

// Result of the store half of a trigger, handed to the dispatch half.
struct Committed {
    cooldown: Cooldown,
    history: HistoryOutcome,
    sender_username: String,
    push_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownStatus {
    pub on_cooldown: bool,
    pub available_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct TriggerEngine {
    stores: Stores,
    ledger: CooldownLedger,
    dispatcher: Arc<dyn PushDispatcher>,
}

impl TriggerEngine {
    pub fn new(stores: Stores, ledger: CooldownLedger, dispatcher: Arc<dyn PushDispatcher>) -> Self {
        Self {
            stores,
            ledger,
            dispatcher,
        }
    }

    /// Sends a respawn notification from `sender` to `target`.
    ///
    /// Refusals are checked in a fixed order: missing users, friendship,
    /// the target's per-friend mute, the target's global mute, then the
    /// cooldown window the target imposes on the sender. Only the push is
    /// awaited on the runtime; store work runs on the blocking pool.
    pub async fn trigger(&self, sender: UserId, target: UserId) -> CoreResult<TriggerOutcome> {
        let engine = self.clone();
        let committed = crate::blocking(move || engine.commit(sender, target)).await?;

        let dispatch = match committed.push_token.as_deref() {
            Some(token) if !token.is_empty() => {
                let message = PushEvent::RespawnTrigger {
                    sender_id: sender,
                    sender_username: committed.sender_username.clone(),
                }
                .to_message();

                match self.dispatcher.send(token, &message).await {
                    Ok(()) => DispatchOutcome::Sent,
                    Err(e) => {
                        warn!("Push to {} failed: {}", target, e);
                        DispatchOutcome::Failed(e.to_string())
                    }
                }
            }
            _ => DispatchOutcome::NoDeliveryToken,
        };

        let cooldown = committed.cooldown;
        info!(
            "Trigger {} -> {} committed, next at {} ({:?}, {:?})",
            sender, target, cooldown.expires_at, committed.history, dispatch
        );

        Ok(TriggerOutcome {
            next_available_at: cooldown.expires_at,
            cooldown,
            history: committed.history,
            dispatch,
        })
    }

    /// Runs every refusal check, writes the cooldown and records history.
    fn commit(&self, sender: UserId, target: UserId) -> CoreResult<Committed> {
        let sender_user = self
            .stores
            .users
            .user_by_id(sender)?
            .ok_or(CoreError::UserNotFound)?;
        let target_user = self
            .stores
            .users
            .user_by_id(target)?
            .ok_or(CoreError::UserNotFound)?;

        let record = match self.stores.friendships.friendship_between(sender, target)? {
            Some(r) if r.status == FriendshipStatus::Accepted => r,
            _ => return Err(CoreError::NotFriends),
        };

        if role::peer_mute_of(&record, sender)? {
            return Err(CoreError::TargetMutedYou);
        }
        if target_user.muted_all {
            return Err(CoreError::TargetMutedAll);
        }

        if let Some(active) = self.ledger.check_active(sender, target)? {
            return Err(CoreError::CooldownActive {
                available_at: active.expires_at,
            });
        }

        let minutes = role::resolve_peer_cooldown(self.stores.friendships.as_ref(), &record, sender)?;
        // a concurrent trigger that committed first surfaces here as CooldownActive
        let cooldown = self.ledger.create(sender, target, minutes)?;

        let history = self.record_history(&sender_user.username, sender, target, cooldown.triggered_at);

        Ok(Committed {
            cooldown,
            history,
            sender_username: sender_user.username,
            push_token: target_user.push_token,
        })
    }

    /// Pure read of the sender's window on the target.
    pub fn check_cooldown(&self, sender: UserId, target: UserId) -> CoreResult<CooldownStatus> {
        Ok(match self.ledger.check_active(sender, target)? {
            Some(active) => CooldownStatus {
                on_cooldown: true,
                available_at: Some(active.expires_at),
            },
            None => CooldownStatus {
                on_cooldown: false,
                available_at: None,
            },
        })
    }

    fn record_history(
        &self,
        sender_username: &str,
        sender: UserId,
        target: UserId,
        at: DateTime<Utc>,
    ) -> HistoryOutcome {
        let entry = History {
            id: Uuid::new_v4(),
            sender_id: sender,
            receiver_id: target,
            sender_username: sender_username.to_string(),
            triggered_at: at,
        };

        match self.stores.history.insert_history(&entry) {
            Ok(()) => HistoryOutcome::Recorded,
            Err(e) => {
                warn!("Failed to record history {} -> {}: {}", sender, target, e);
                HistoryOutcome::Failed(e.to_string())
            }
        }
    }
}
