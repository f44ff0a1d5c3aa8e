use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::info;
use uuid::Uuid;

use rbd_types::models::{User, UserId};

use crate::error::{CoreError, CoreResult};
use crate::session::SessionStore;
use crate::store::UserStore;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 16;
const PASSWORD_MIN: usize = 6;

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub token: String,
}

/// Registration, login and session management.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: SessionStore,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, sessions: SessionStore) -> Self {
        Self { users, sessions }
    }

    pub async fn register(&self, username: &str, password: &str) -> CoreResult<Session> {
        validate_username(username)?;
        if password.chars().count() < PASSWORD_MIN {
            return Err(CoreError::Validation(format!(
                "password must be at least {} characters",
                PASSWORD_MIN
            )));
        }

        let users = self.users.clone();
        let username = username.to_string();
        let password = password.to_string();
        // hashing and the insert both block
        let user = crate::blocking(move || {
            let user = User {
                id: Uuid::new_v4(),
                username,
                password_hash: hash_password(&password)?,
                push_token: None,
                created_at: crate::now(),
                muted_all: false,
            };
            if !users.insert_user(&user)? {
                return Err(CoreError::AlreadyExists("username"));
            }
            Ok(user)
        })
        .await?;

        info!("Registered user {} ({})", user.username, user.id);
        let token = self.sessions.issue(user.id).await;
        Ok(Session {
            user_id: user.id,
            username: user.username,
            token,
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> CoreResult<Session> {
        let users = self.users.clone();
        let username = username.to_string();
        let password = password.to_string();
        let user = crate::blocking(move || {
            let user = users
                .user_by_username(&username)?
                .ok_or(CoreError::InvalidCredentials)?;
            verify_password(&user.password_hash, &password)?;
            Ok(user)
        })
        .await?;

        let token = self.sessions.issue(user.id).await;
        Ok(Session {
            user_id: user.id,
            username: user.username,
            token,
        })
    }

    pub async fn logout(&self, token: &str) {
        self.sessions.revoke(token).await;
    }

    /// Slides the token's expiry forward.
    pub async fn refresh(&self, token: &str) -> CoreResult<()> {
        if !self.sessions.refresh(token).await {
            return Err(CoreError::Unauthorized("session expired"));
        }
        Ok(())
    }

    pub async fn authenticate(&self, token: &str) -> CoreResult<UserId> {
        self.sessions
            .validate(token)
            .await
            .ok_or(CoreError::Unauthorized("invalid or expired token"))
    }

    pub fn update_push_token(&self, user: UserId, push_token: &str) -> CoreResult<()> {
        if push_token.trim().is_empty() {
            return Err(CoreError::Validation("push token is required".into()));
        }
        if !self.users.set_push_token(user, push_token)? {
            return Err(CoreError::UserNotFound);
        }
        Ok(())
    }
}

// Hash password with Argon2id
fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string())
}

fn verify_password(stored: &str, password: &str) -> CoreResult<()> {
    let parsed_hash =
        PasswordHash::new(stored).map_err(|e| anyhow::anyhow!("stored password hash is unreadable: {}", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| CoreError::InvalidCredentials)
}

fn validate_username(username: &str) -> CoreResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(CoreError::Validation(format!(
            "username must be {} to {} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CoreError::Validation(
            "username may only contain letters, numbers and underscores".into(),
        ));
    }
    Ok(())
}
