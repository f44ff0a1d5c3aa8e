//! Database row types. These map directly to SQLite rows and convert into
//! the shared models in `rbd-types`.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use rbd_types::models::{Cooldown, Friendship, FriendshipStatus, History, PerSlot, User};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub push_token: Option<String>,
    pub muted_all: bool,
    pub created_ms: i64,
}

pub struct FriendshipRow {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    pub status: String,
    pub requested_ms: i64,
    pub accepted_ms: Option<i64>,
    pub muted_a: bool,
    pub muted_b: bool,
    pub cooldown_a: i64,
    pub cooldown_b: i64,
}

pub struct CooldownRow {
    pub id: String,
    pub initiator: String,
    pub target: String,
    pub triggered_ms: i64,
    pub expires_ms: i64,
}

pub struct HistoryRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub sender_username: String,
    pub triggered_ms: i64,
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| anyhow!("Bad id '{}' in database: {}", raw, e))
}

pub(crate) fn from_ms(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("Timestamp out of range: {}", ms))
}

pub(crate) fn to_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_id(&row.id)?,
            username: row.username,
            password_hash: row.password,
            push_token: row.push_token,
            created_at: from_ms(row.created_ms)?,
            muted_all: row.muted_all,
        })
    }
}

impl TryFrom<FriendshipRow> for Friendship {
    type Error = anyhow::Error;

    fn try_from(row: FriendshipRow) -> Result<Self> {
        let status: FriendshipStatus = row.status.parse().map_err(|e: String| anyhow!(e))?;
        Ok(Friendship {
            id: parse_id(&row.id)?,
            users: PerSlot::new(parse_id(&row.user_a)?, parse_id(&row.user_b)?),
            status,
            requested_at: from_ms(row.requested_ms)?,
            accepted_at: row.accepted_ms.map(from_ms).transpose()?,
            muted_peer: PerSlot::new(row.muted_a, row.muted_b),
            cooldown_minutes: PerSlot::new(row.cooldown_a, row.cooldown_b),
        })
    }
}

impl TryFrom<CooldownRow> for Cooldown {
    type Error = anyhow::Error;

    fn try_from(row: CooldownRow) -> Result<Self> {
        Ok(Cooldown {
            id: parse_id(&row.id)?,
            initiator: parse_id(&row.initiator)?,
            target: parse_id(&row.target)?,
            triggered_at: from_ms(row.triggered_ms)?,
            expires_at: from_ms(row.expires_ms)?,
        })
    }
}

impl TryFrom<HistoryRow> for History {
    type Error = anyhow::Error;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(History {
            id: parse_id(&row.id)?,
            sender_id: parse_id(&row.sender_id)?,
            receiver_id: parse_id(&row.receiver_id)?,
            sender_username: row.sender_username,
            triggered_at: from_ms(row.triggered_ms)?,
        })
    }
}
