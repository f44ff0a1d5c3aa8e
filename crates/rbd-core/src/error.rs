use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by the friendship, cooldown and trigger services.
///
/// Everything except `Store` is a client-facing rejection. `CooldownActive`
/// is the only one a client should retry, once `available_at` has passed.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("user not found")]
    UserNotFound,

    #[error("target user not found")]
    TargetNotFound,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("user is not a party to this friendship")]
    NotAParty,

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("cannot send friend request to yourself")]
    SelfRequest,

    #[error("already friends")]
    AlreadyFriends,

    #[error("friend request already sent")]
    RequestAlreadySent,

    #[error("this user already sent you a friend request")]
    RequestAlreadyReceived,

    #[error("friend request was rejected")]
    RequestRejected,

    #[error("users are not friends")]
    NotFriends,

    #[error("friend has muted you")]
    TargetMutedYou,

    #[error("user has muted all notifications")]
    TargetMutedAll,

    #[error("cooldown active until {available_at}")]
    CooldownActive { available_at: DateTime<Utc> },

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Stable machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::UserNotFound => "user_not_found",
            Self::TargetNotFound => "target_not_found",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotAParty => "not_a_party",
            Self::InvalidState(_) => "invalid_state",
            Self::AlreadyExists(_) => "already_exists",
            Self::SelfRequest => "self_request",
            Self::AlreadyFriends => "already_friends",
            Self::RequestAlreadySent => "request_already_sent",
            Self::RequestAlreadyReceived => "request_already_received",
            Self::RequestRejected => "request_rejected",
            Self::NotFriends => "not_friends",
            Self::TargetMutedYou => "friend_muted_you",
            Self::TargetMutedAll => "user_muted_all",
            Self::CooldownActive { .. } => "cooldown_active",
            Self::Store(_) => "internal_error",
        }
    }
}
