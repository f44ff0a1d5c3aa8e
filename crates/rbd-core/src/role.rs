//! Role resolution for two-slot friendship records.
//!
//! "Can A trigger B" is governed by settings B controls, so most reads look
//! at the peer's slot while every write goes to the acting user's own slot.
//! No other module branches on `Slot`.

use tracing::warn;

use rbd_types::models::{DEFAULT_COOLDOWN_MINUTES, Friendship, FriendshipUpdate, Slot, UserId};

use crate::error::{CoreError, CoreResult};
use crate::store::FriendshipStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role {
    pub own: Slot,
    pub peer: Slot,
}

impl Role {
    /// Slot A is the user who sent the original request.
    pub fn is_slot_a(&self) -> bool {
        self.own == Slot::A
    }

    pub fn is_recipient(&self) -> bool {
        self.own == Slot::B
    }
}

pub fn resolve_role(record: &Friendship, acting: UserId) -> CoreResult<Role> {
    let own = if record.users.a == acting {
        Slot::A
    } else if record.users.b == acting {
        Slot::B
    } else {
        return Err(CoreError::NotAParty);
    };

    Ok(Role {
        own,
        peer: own.other(),
    })
}

pub fn peer_of(record: &Friendship, acting: UserId) -> CoreResult<UserId> {
    let role = resolve_role(record, acting)?;
    Ok(*record.users.get(role.peer))
}

/// Whether the peer suppresses notifications from the acting user.
pub fn peer_mute_of(record: &Friendship, acting: UserId) -> CoreResult<bool> {
    let role = resolve_role(record, acting)?;
    Ok(*record.muted_peer.get(role.peer))
}

/// Whether the acting user suppresses notifications from the peer.
pub fn own_mute_of(record: &Friendship, acting: UserId) -> CoreResult<bool> {
    let role = resolve_role(record, acting)?;
    Ok(*record.muted_peer.get(role.own))
}

/// Minutes the peer imposes between the acting user's triggers.
pub fn cooldown_imposed_by_peer_on(record: &Friendship, acting: UserId) -> CoreResult<i64> {
    let role = resolve_role(record, acting)?;
    Ok(effective_minutes(*record.cooldown_minutes.get(role.peer)))
}

/// Minutes the acting user imposes between the peer's triggers.
pub fn own_cooldown_of(record: &Friendship, acting: UserId) -> CoreResult<i64> {
    let role = resolve_role(record, acting)?;
    Ok(effective_minutes(*record.cooldown_minutes.get(role.own)))
}

/// Like [`cooldown_imposed_by_peer_on`], but an uninitialized stored value is
/// also written back as the default. The write never fails the read.
pub fn resolve_peer_cooldown(
    store: &dyn FriendshipStore,
    record: &Friendship,
    acting: UserId,
) -> CoreResult<i64> {
    let role = resolve_role(record, acting)?;
    Ok(resolve_slot_cooldown(store, record, role.peer))
}

/// Own-slot counterpart of [`resolve_peer_cooldown`].
pub fn resolve_own_cooldown(
    store: &dyn FriendshipStore,
    record: &Friendship,
    acting: UserId,
) -> CoreResult<i64> {
    let role = resolve_role(record, acting)?;
    Ok(resolve_slot_cooldown(store, record, role.own))
}

pub fn set_own_mute(record: &Friendship, acting: UserId, muted: bool) -> CoreResult<FriendshipUpdate> {
    let role = resolve_role(record, acting)?;
    Ok(FriendshipUpdate::Mute {
        slot: role.own,
        muted,
    })
}

pub fn set_own_cooldown(record: &Friendship, acting: UserId, minutes: i64) -> CoreResult<FriendshipUpdate> {
    let role = resolve_role(record, acting)?;
    Ok(FriendshipUpdate::Cooldown {
        slot: role.own,
        minutes,
    })
}

fn effective_minutes(stored: i64) -> i64 {
    if stored <= 0 { DEFAULT_COOLDOWN_MINUTES } else { stored }
}

fn resolve_slot_cooldown(store: &dyn FriendshipStore, record: &Friendship, slot: Slot) -> i64 {
    let stored = *record.cooldown_minutes.get(slot);
    if stored > 0 {
        return stored;
    }

    let heal = FriendshipUpdate::Cooldown {
        slot,
        minutes: DEFAULT_COOLDOWN_MINUTES,
    };
    if let Err(e) = store.update_friendship(record.id, heal) {
        warn!("Failed to heal cooldown on friendship {}: {}", record.id, e);
    }

    DEFAULT_COOLDOWN_MINUTES
}
