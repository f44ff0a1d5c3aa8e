use tracing::{info, warn};
use uuid::Uuid;

use rbd_types::api::{FriendInfo, FriendRequestInfo, MAX_HISTORY_LIMIT, UserSummary};
use rbd_types::models::{
    Friendship, FriendshipStatus, FriendshipUpdate, History, MAX_COOLDOWN_MINUTES, MIN_COOLDOWN_MINUTES,
    UserId,
};

use crate::cooldown::{CooldownLedger, remaining_secs};
use crate::error::{CoreError, CoreResult};
use crate::role;
use crate::store::{ConditionalInsert, Stores};

const SEARCH_LIMIT: usize = 20;
const SEARCH_MIN_CHARS: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct FriendPolicy {
    /// Whether a rejected request may be replaced by a new one. When false a
    /// rejection permanently blocks the pair.
    pub allow_rerequest_after_rejection: bool,
}

/// Friend request lifecycle and per-friend settings.
#[derive(Clone)]
pub struct FriendService {
    stores: Stores,
    ledger: CooldownLedger,
    policy: FriendPolicy,
}

impl FriendService {
    pub fn new(stores: Stores, ledger: CooldownLedger, policy: FriendPolicy) -> Self {
        Self {
            stores,
            ledger,
            policy,
        }
    }

    /// Creates a pending request with `sender` in slot A. Returns its id.
    pub fn send_request(&self, sender: UserId, target: UserId) -> CoreResult<Uuid> {
        if sender == target {
            return Err(CoreError::SelfRequest);
        }

        if self.stores.users.user_by_id(target)?.is_none() {
            return Err(CoreError::TargetNotFound);
        }

        if let Some(existing) = self.stores.friendships.friendship_between(sender, target)? {
            self.clear_for_new_request(&existing, sender)?;
        }

        let record = Friendship::request(sender, target, crate::now());
        match self.stores.friendships.insert_friendship_if_absent(&record)? {
            ConditionalInsert::Inserted => {
                info!("Friend request {} sent: {} -> {}", record.id, sender, target);
                Ok(record.id)
            }
            // lost a race with a concurrent request for the same pair
            ConditionalInsert::Existing(existing) => Err(blocking_error(&existing, sender)),
        }
    }

    pub fn accept(&self, user: UserId, request_id: Uuid) -> CoreResult<()> {
        self.respond(user, request_id, FriendshipUpdate::Accept { at: crate::now() })?;
        info!("Friend request {} accepted by {}", request_id, user);
        Ok(())
    }

    pub fn reject(&self, user: UserId, request_id: Uuid) -> CoreResult<()> {
        self.respond(user, request_id, FriendshipUpdate::Reject)?;
        info!("Friend request {} rejected by {}", request_id, user);
        Ok(())
    }

    /// Deletes the pair's record whatever its status.
    pub fn remove(&self, user: UserId, friend: UserId) -> CoreResult<()> {
        let record = self.pair(user, friend)?;
        if !self.stores.friendships.delete_friendship(record.id)? {
            return Err(CoreError::NotFound("friendship"));
        }
        info!("Friendship {} removed by {}", record.id, user);
        Ok(())
    }

    /// Mutes or unmutes triggers coming from `friend`.
    pub fn set_mute(&self, user: UserId, friend: UserId, muted: bool) -> CoreResult<()> {
        let record = self.pair(user, friend)?;
        let update = role::set_own_mute(&record, user, muted)?;
        if !self.stores.friendships.update_friendship(record.id, update)? {
            return Err(CoreError::NotFound("friendship"));
        }
        Ok(())
    }

    pub fn set_mute_all(&self, user: UserId, muted_all: bool) -> CoreResult<()> {
        if !self.stores.users.set_muted_all(user, muted_all)? {
            return Err(CoreError::UserNotFound);
        }
        Ok(())
    }

    /// Sets how often `friend` may trigger `user`, and re-times the friend's
    /// in-flight window to match.
    pub fn set_cooldown(&self, user: UserId, friend: UserId, minutes: i64) -> CoreResult<()> {
        validate_cooldown(minutes)?;

        let record = self.pair(user, friend)?;
        if record.status != FriendshipStatus::Accepted {
            return Err(CoreError::InvalidState("can only set cooldown for accepted friends"));
        }

        let update = role::set_own_cooldown(&record, user, minutes)?;
        if !self.stores.friendships.update_friendship(record.id, update)? {
            return Err(CoreError::NotFound("friendship"));
        }

        if let Err(e) = self.ledger.reconfigure_active(friend, user, minutes) {
            warn!("Failed to re-time cooldown {} -> {}: {}", friend, user, e);
        }
        Ok(())
    }

    pub fn list_friends(&self, user: UserId) -> CoreResult<Vec<FriendInfo>> {
        let records = self
            .stores
            .friendships
            .friendships_for(user, FriendshipStatus::Accepted)?;
        let now = crate::now();

        let mut friends = Vec::with_capacity(records.len());
        for record in &records {
            let friend_id = role::peer_of(record, user)?;
            let Some(friend) = self.stores.users.user_by_id(friend_id)? else {
                warn!("Friendship {} points at missing user {}", record.id, friend_id);
                continue;
            };

            let remaining = match self.ledger.check_active(user, friend_id)? {
                Some(active) => remaining_secs(active.expires_at, now),
                None => 0,
            };

            friends.push(FriendInfo {
                user_id: friend_id,
                username: friend.username,
                is_muted: role::own_mute_of(record, user)?,
                is_muted_by: role::peer_mute_of(record, user)?,
                cooldown_minutes: role::resolve_own_cooldown(self.stores.friendships.as_ref(), record, user)?,
                peer_cooldown_minutes: role::resolve_peer_cooldown(self.stores.friendships.as_ref(), record, user)?,
                cooldown_remaining_secs: remaining,
                can_trigger: remaining == 0,
            });
        }

        Ok(friends)
    }

    /// Pending requests addressed to `user`.
    pub fn pending_requests(&self, user: UserId) -> CoreResult<Vec<FriendRequestInfo>> {
        let records = self
            .stores
            .friendships
            .friendships_for(user, FriendshipStatus::Pending)?;

        let mut requests = Vec::new();
        for record in &records {
            if !role::resolve_role(record, user)?.is_recipient() {
                continue;
            }
            let requester_id = role::peer_of(record, user)?;
            let Some(requester) = self.stores.users.user_by_id(requester_id)? else {
                continue;
            };
            requests.push(FriendRequestInfo {
                request_id: record.id,
                user_id: requester_id,
                username: requester.username,
                requested_at: record.requested_at,
            });
        }

        Ok(requests)
    }

    pub fn search_users(&self, user: UserId, query: &str) -> CoreResult<Vec<UserSummary>> {
        let query = query.trim();
        if query.chars().count() < SEARCH_MIN_CHARS {
            return Ok(vec![]);
        }

        let users = self.stores.users.search_users(query, SEARCH_LIMIT + 1)?;
        Ok(users
            .into_iter()
            .filter(|u| u.id != user)
            .take(SEARCH_LIMIT)
            .map(|u| UserSummary {
                user_id: u.id,
                username: u.username,
            })
            .collect())
    }

    /// Trigger history between two users, newest first. `page` is 1-based.
    pub fn history_with(&self, user: UserId, friend: UserId, page: u32, limit: u32) -> CoreResult<(Vec<History>, usize)> {
        let page = page.max(1) as usize;
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT) as usize;
        let offset = (page - 1) * limit;
        Ok(self.stores.history.history_between(user, friend, offset, limit)?)
    }

    fn respond(&self, user: UserId, request_id: Uuid, update: FriendshipUpdate) -> CoreResult<()> {
        let record = self
            .stores
            .friendships
            .friendship_by_id(request_id)?
            .ok_or(CoreError::NotFound("friend request"))?;

        // only the recipient may respond
        match role::resolve_role(&record, user) {
            Ok(r) if r.is_recipient() => {}
            _ => return Err(CoreError::Forbidden("only the recipient may respond to this request")),
        }

        if record.status != FriendshipStatus::Pending {
            return Err(CoreError::InvalidState("friend request is not pending"));
        }

        if !self.stores.friendships.update_friendship(record.id, update)? {
            // raced with another response or a removal
            return Err(CoreError::InvalidState("friend request is not pending"));
        }
        Ok(())
    }

    fn pair(&self, user: UserId, friend: UserId) -> CoreResult<Friendship> {
        self.stores
            .friendships
            .friendship_between(user, friend)?
            .ok_or(CoreError::NotFound("friendship"))
    }

    /// Decides whether `existing` blocks a new request from `sender`, deleting
    /// it when the re-request policy allows.
    fn clear_for_new_request(&self, existing: &Friendship, sender: UserId) -> CoreResult<()> {
        if existing.status == FriendshipStatus::Rejected && self.policy.allow_rerequest_after_rejection {
            self.stores.friendships.delete_friendship(existing.id)?;
            info!("Replacing rejected request {} with a new one from {}", existing.id, sender);
            return Ok(());
        }
        Err(blocking_error(existing, sender))
    }
}

pub fn validate_cooldown(minutes: i64) -> CoreResult<()> {
    if !(MIN_COOLDOWN_MINUTES..=MAX_COOLDOWN_MINUTES).contains(&minutes) {
        return Err(CoreError::Validation(format!(
            "cooldown must be between {} and {} minutes",
            MIN_COOLDOWN_MINUTES, MAX_COOLDOWN_MINUTES
        )));
    }
    Ok(())
}

fn blocking_error(existing: &Friendship, sender: UserId) -> CoreError {
    match existing.status {
        FriendshipStatus::Accepted => CoreError::AlreadyFriends,
        FriendshipStatus::Rejected => CoreError::RequestRejected,
        FriendshipStatus::Pending => match role::resolve_role(existing, sender) {
            Ok(r) if r.is_slot_a() => CoreError::RequestAlreadySent,
            _ => CoreError::RequestAlreadyReceived,
        },
    }
}
