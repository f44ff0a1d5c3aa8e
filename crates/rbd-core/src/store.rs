//! Collaborator interfaces for persistence and push delivery.
//!
//! Every store call is fallible I/O. Implementations must make the two
//! `*_if_*` inserts atomic: the check and the write happen as one step at the
//! storage boundary, never as two separate calls from the caller.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use uuid::Uuid;

use rbd_types::events::PushMessage;
use rbd_types::models::{Cooldown, Friendship, FriendshipStatus, FriendshipUpdate, History, User, UserId};

/// Result of a conditional insert.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalInsert<T> {
    Inserted,
    /// The write was refused because this record already holds the key.
    Existing(T),
}

pub trait UserStore: Send + Sync {
    /// Returns false if the username is already taken.
    fn insert_user(&self, user: &User) -> Result<bool>;
    fn user_by_id(&self, id: UserId) -> Result<Option<User>>;
    /// Exact, case-sensitive match.
    fn user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn set_muted_all(&self, id: UserId, muted_all: bool) -> Result<bool>;
    fn set_push_token(&self, id: UserId, push_token: &str) -> Result<bool>;
    /// Case-insensitive prefix match, at most `limit` users.
    fn search_users(&self, prefix: &str, limit: usize) -> Result<Vec<User>>;
}

pub trait FriendshipStore: Send + Sync {
    /// Inserts unless a record already exists for the unordered pair.
    fn insert_friendship_if_absent(&self, record: &Friendship) -> Result<ConditionalInsert<Friendship>>;
    fn friendship_by_id(&self, id: Uuid) -> Result<Option<Friendship>>;
    /// Looks the pair up in either slot order.
    fn friendship_between(&self, u: UserId, v: UserId) -> Result<Option<Friendship>>;
    /// Accept and Reject only apply to pending records. Returns false when
    /// nothing changed.
    fn update_friendship(&self, id: Uuid, update: FriendshipUpdate) -> Result<bool>;
    fn delete_friendship(&self, id: Uuid) -> Result<bool>;
    /// Records in `status` where `user` occupies either slot.
    fn friendships_for(&self, user: UserId, status: FriendshipStatus) -> Result<Vec<Friendship>>;
}

pub trait CooldownStore: Send + Sync {
    /// Inserts unless the ordered pair already has a record expiring after
    /// `record.triggered_at`, in which case the latest such record is returned.
    fn insert_cooldown_if_idle(&self, record: &Cooldown) -> Result<ConditionalInsert<Cooldown>>;
    /// The latest-expiring record with `expires_at > now`.
    fn active_cooldown(&self, initiator: UserId, target: UserId, now: DateTime<Utc>) -> Result<Option<Cooldown>>;
    fn set_cooldown_expiry(&self, id: Uuid, expires_at: DateTime<Utc>) -> Result<bool>;
    /// Deletes records with `expires_at < now`, returning how many went.
    fn delete_expired_cooldowns(&self, now: DateTime<Utc>) -> Result<usize>;
}

pub trait HistoryStore: Send + Sync {
    fn insert_history(&self, entry: &History) -> Result<()>;
    /// Entries in both directions, newest first, with the unpaged total.
    fn history_between(&self, u: UserId, v: UserId, offset: usize, limit: usize) -> Result<(Vec<History>, usize)>;
}

/// Delivers a push notification to one device.
pub trait PushDispatcher: Send + Sync {
    fn send<'a>(&'a self, delivery_token: &'a str, message: &'a PushMessage) -> BoxFuture<'a, Result<()>>;
}

/// The set of stores the services are built from.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub friendships: Arc<dyn FriendshipStore>,
    pub cooldowns: Arc<dyn CooldownStore>,
    pub history: Arc<dyn HistoryStore>,
}

impl Stores {
    /// Uses one backend for every store.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + FriendshipStore + CooldownStore + HistoryStore + 'static,
    {
        Self {
            users: store.clone(),
            friendships: store.clone(),
            cooldowns: store.clone(),
            history: store,
        }
    }
}
