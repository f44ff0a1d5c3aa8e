//! In-process implementation of every store trait.
//!
//! One mutex guards all tables, which makes the conditional inserts atomic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use rbd_types::models::{Cooldown, Friendship, FriendshipStatus, FriendshipUpdate, History, User, UserId};

use crate::store::{ConditionalInsert, CooldownStore, FriendshipStore, HistoryStore, UserStore};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    friendships: HashMap<Uuid, Friendship>,
    cooldowns: HashMap<Uuid, Cooldown>,
    history: Vec<History>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| anyhow!("Memory store lock poisoned: {}", e))
    }

    /// Inserts a cooldown without the idle check. Lets callers seed
    /// historical or legacy rows.
    pub fn insert_cooldown_unchecked(&self, record: Cooldown) -> Result<()> {
        self.lock()?.cooldowns.insert(record.id, record);
        Ok(())
    }

    /// Replaces a stored friendship wholesale.
    pub fn put_friendship(&self, record: Friendship) -> Result<()> {
        self.lock()?.friendships.insert(record.id, record);
        Ok(())
    }

    pub fn cooldowns_between(&self, initiator: UserId, target: UserId) -> Result<Vec<Cooldown>> {
        let tables = self.lock()?;
        Ok(tables
            .cooldowns
            .values()
            .filter(|c| c.initiator == initiator && c.target == target)
            .cloned()
            .collect())
    }

    pub fn friendship_count(&self) -> Result<usize> {
        Ok(self.lock()?.friendships.len())
    }
}

fn find_pair(tables: &Tables, u: UserId, v: UserId) -> Option<&Friendship> {
    tables
        .friendships
        .values()
        .find(|f| (f.users.a == u && f.users.b == v) || (f.users.a == v && f.users.b == u))
}

fn latest_active(tables: &Tables, initiator: UserId, target: UserId, now: DateTime<Utc>) -> Option<Cooldown> {
    tables
        .cooldowns
        .values()
        .filter(|c| c.initiator == initiator && c.target == target && c.is_active_at(now))
        .max_by_key(|c| c.expires_at)
        .cloned()
}

impl UserStore for MemoryStore {
    fn insert_user(&self, user: &User) -> Result<bool> {
        let mut tables = self.lock()?;
        if tables.users.values().any(|u| u.username == user.username) {
            return Ok(false);
        }
        tables.users.insert(user.id, user.clone());
        Ok(true)
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    fn set_muted_all(&self, id: UserId, muted_all: bool) -> Result<bool> {
        let mut tables = self.lock()?;
        Ok(tables
            .users
            .get_mut(&id)
            .map(|u| u.muted_all = muted_all)
            .is_some())
    }

    fn set_push_token(&self, id: UserId, push_token: &str) -> Result<bool> {
        let mut tables = self.lock()?;
        Ok(tables
            .users
            .get_mut(&id)
            .map(|u| u.push_token = Some(push_token.to_string()))
            .is_some())
    }

    fn search_users(&self, prefix: &str, limit: usize) -> Result<Vec<User>> {
        let prefix = prefix.to_lowercase();
        let tables = self.lock()?;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.username.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users.truncate(limit);
        Ok(users)
    }
}

impl FriendshipStore for MemoryStore {
    fn insert_friendship_if_absent(&self, record: &Friendship) -> Result<ConditionalInsert<Friendship>> {
        let mut tables = self.lock()?;
        if let Some(existing) = find_pair(&tables, record.users.a, record.users.b) {
            return Ok(ConditionalInsert::Existing(existing.clone()));
        }
        tables.friendships.insert(record.id, record.clone());
        Ok(ConditionalInsert::Inserted)
    }

    fn friendship_by_id(&self, id: Uuid) -> Result<Option<Friendship>> {
        Ok(self.lock()?.friendships.get(&id).cloned())
    }

    fn friendship_between(&self, u: UserId, v: UserId) -> Result<Option<Friendship>> {
        let tables = self.lock()?;
        Ok(find_pair(&tables, u, v).cloned())
    }

    fn update_friendship(&self, id: Uuid, update: FriendshipUpdate) -> Result<bool> {
        let mut tables = self.lock()?;
        Ok(match tables.friendships.get_mut(&id) {
            Some(record) => update.apply(record),
            None => false,
        })
    }

    fn delete_friendship(&self, id: Uuid) -> Result<bool> {
        Ok(self.lock()?.friendships.remove(&id).is_some())
    }

    fn friendships_for(&self, user: UserId, status: FriendshipStatus) -> Result<Vec<Friendship>> {
        let tables = self.lock()?;
        let mut records: Vec<Friendship> = tables
            .friendships
            .values()
            .filter(|f| f.status == status && f.involves(user))
            .cloned()
            .collect();
        records.sort_by_key(|f| f.requested_at);
        Ok(records)
    }
}

impl CooldownStore for MemoryStore {
    fn insert_cooldown_if_idle(&self, record: &Cooldown) -> Result<ConditionalInsert<Cooldown>> {
        let mut tables = self.lock()?;
        if let Some(active) = latest_active(&tables, record.initiator, record.target, record.triggered_at) {
            return Ok(ConditionalInsert::Existing(active));
        }
        tables.cooldowns.insert(record.id, record.clone());
        Ok(ConditionalInsert::Inserted)
    }

    fn active_cooldown(&self, initiator: UserId, target: UserId, now: DateTime<Utc>) -> Result<Option<Cooldown>> {
        let tables = self.lock()?;
        Ok(latest_active(&tables, initiator, target, now))
    }

    fn set_cooldown_expiry(&self, id: Uuid, expires_at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.lock()?;
        Ok(tables
            .cooldowns
            .get_mut(&id)
            .map(|c| c.expires_at = expires_at)
            .is_some())
    }

    fn delete_expired_cooldowns(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.lock()?;
        let before = tables.cooldowns.len();
        tables.cooldowns.retain(|_, c| c.expires_at >= now);
        Ok(before - tables.cooldowns.len())
    }
}

impl HistoryStore for MemoryStore {
    fn insert_history(&self, entry: &History) -> Result<()> {
        self.lock()?.history.push(entry.clone());
        Ok(())
    }

    fn history_between(&self, u: UserId, v: UserId, offset: usize, limit: usize) -> Result<(Vec<History>, usize)> {
        let tables = self.lock()?;
        let mut entries: Vec<History> = tables
            .history
            .iter()
            .filter(|h| (h.sender_id == u && h.receiver_id == v) || (h.sender_id == v && h.receiver_id == u))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));

        let total = entries.len();
        let page = entries.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }
}
