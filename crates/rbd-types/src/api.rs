use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::History;

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePushTokenRequest {
    pub push_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_at: Option<DateTime<Utc>>,
}

// -- Friends --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendFriendRequestBody {
    pub target_user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFriendRequestResponse {
    pub request_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RespondFriendRequestBody {
    pub request_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchUsersRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MuteFriendRequest {
    pub friend_user_id: Uuid,
    pub muted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MuteAllRequest {
    pub muted_all: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCooldownRequest {
    pub friend_user_id: Uuid,
    pub cooldown_minutes: i64,
}

/// A friend as seen by the requesting user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendInfo {
    pub user_id: Uuid,
    pub username: String,
    /// I have muted this friend.
    pub is_muted: bool,
    /// This friend has muted me; my trigger is disabled.
    pub is_muted_by: bool,
    /// Cooldown I impose on this friend's triggers.
    pub cooldown_minutes: i64,
    /// Cooldown this friend imposes on my triggers.
    pub peer_cooldown_minutes: i64,
    pub cooldown_remaining_secs: i64,
    pub can_trigger: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestInfo {
    pub request_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub requested_at: DateTime<Utc>,
}

// -- Notifications --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TriggerRequest {
    pub target_user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub success: bool,
    pub next_available_at: DateTime<Utc>,
    pub history_recorded: bool,
    pub notification_sent: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownResponse {
    pub on_cooldown: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_at: Option<DateTime<Utc>>,
}

// -- History --

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Raw paging parameters. Unparseable or out-of-range values fall back to
/// the defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl HistoryQuery {
    /// 1-based page, 1 unless a positive integer was given.
    pub fn page(&self) -> u32 {
        parse_positive(self.page.as_deref()).unwrap_or(1)
    }

    /// Page size, [`DEFAULT_HISTORY_LIMIT`] unless a value in
    /// `1..=MAX_HISTORY_LIMIT` was given.
    pub fn limit(&self) -> u32 {
        parse_positive(self.limit.as_deref())
            .filter(|l| *l <= MAX_HISTORY_LIMIT)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw?.trim().parse::<u32>().ok().filter(|v| *v > 0)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<History>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, limit: Option<&str>) -> HistoryQuery {
        HistoryQuery {
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn history_paging_falls_back_on_bad_input() {
        assert_eq!(HistoryQuery::default().page(), 1);
        assert_eq!(HistoryQuery::default().limit(), DEFAULT_HISTORY_LIMIT);

        let q = query(Some("3"), Some("20"));
        assert_eq!((q.page(), q.limit()), (3, 20));

        for (page, limit) in [("abc", "500"), ("0", "0"), ("-2", "-5"), ("", "x")] {
            let q = query(Some(page), Some(limit));
            assert_eq!(q.page(), 1, "page {:?}", page);
            assert_eq!(q.limit(), DEFAULT_HISTORY_LIMIT, "limit {:?}", limit);
        }
        assert_eq!(query(None, Some("100")).limit(), 100);
    }
}
