use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// Cooldown applied when a friendship has no usable setting stored.
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 60;

/// Inclusive bounds accepted when a user changes a cooldown.
pub const MIN_COOLDOWN_MINUTES: i64 = 1;
pub const MAX_COOLDOWN_MINUTES: i64 = 1440;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub muted_all: bool,
}

/// One of the two fixed positions in a friendship record. Slot A is always
/// the user who sent the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// A value held once per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerSlot<T> {
    pub a: T,
    pub b: T,
}

impl<T> PerSlot<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    pub fn get(&self, slot: Slot) -> &T {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    pub fn set(&mut self, slot: Slot, value: T) {
        match slot {
            Slot::A => self.a = value,
            Slot::B => self.b = value,
        }
    }
}

impl<T: Clone> PerSlot<T> {
    pub fn both(value: T) -> Self {
        Self {
            a: value.clone(),
            b: value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendshipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for FriendshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FriendshipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown friendship status '{}'", other)),
        }
    }
}

/// A friendship or pending friend request between two users.
///
/// `muted_peer` says whether the slot's occupant suppresses triggers coming
/// from the other slot. `cooldown_minutes` is the window the slot's occupant
/// imposes on triggers directed at them. Legacy rows may store a value <= 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub id: Uuid,
    pub users: PerSlot<UserId>,
    pub status: FriendshipStatus,
    pub requested_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub muted_peer: PerSlot<bool>,
    pub cooldown_minutes: PerSlot<i64>,
}

impl Friendship {
    /// A fresh pending request from `requester` to `recipient`.
    pub fn request(requester: UserId, recipient: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            users: PerSlot::new(requester, recipient),
            status: FriendshipStatus::Pending,
            requested_at: now,
            accepted_at: None,
            muted_peer: PerSlot::both(false),
            cooldown_minutes: PerSlot::both(DEFAULT_COOLDOWN_MINUTES),
        }
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.users.a == user || self.users.b == user
    }
}

/// Field-level updates applied to a stored friendship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendshipUpdate {
    Accept { at: DateTime<Utc> },
    Reject,
    Mute { slot: Slot, muted: bool },
    Cooldown { slot: Slot, minutes: i64 },
}

impl FriendshipUpdate {
    /// Applies the update in place. Status transitions only leave `Pending`;
    /// returns false if the record was left untouched.
    pub fn apply(self, record: &mut Friendship) -> bool {
        match self {
            Self::Accept { at } => {
                if record.status != FriendshipStatus::Pending {
                    return false;
                }
                record.status = FriendshipStatus::Accepted;
                record.accepted_at = Some(at);
            }
            Self::Reject => {
                if record.status != FriendshipStatus::Pending {
                    return false;
                }
                record.status = FriendshipStatus::Rejected;
            }
            Self::Mute { slot, muted } => record.muted_peer.set(slot, muted),
            Self::Cooldown { slot, minutes } => record.cooldown_minutes.set(slot, minutes),
        }
        true
    }
}

/// A rate-limit window for one ordered (initiator, target) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cooldown {
    pub id: Uuid,
    pub initiator: UserId,
    pub target: UserId,
    pub triggered_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Cooldown {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub sender_username: String,
    pub triggered_at: DateTime<Utc>,
}
