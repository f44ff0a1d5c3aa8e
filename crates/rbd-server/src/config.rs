use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use rbd_core::{FriendPolicy, SessionConfig};

/// Server settings read from `RBD_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub sessions: SessionConfig,
    pub cooldown_sweep_interval: Duration,
    pub friend_policy: FriendPolicy,
    /// Push gateway endpoint. Pushes are only logged when unset.
    pub push_url: Option<String>,
    pub push_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("RBD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("RBD_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .context("RBD_PORT must be a port number")?;
        let db_path: PathBuf = std::env::var("RBD_DB_PATH").unwrap_or_else(|_| "rbd.db".into()).into();

        let ttl_days: u64 = parse_or("RBD_SESSION_TTL_DAYS", 30)?;
        let session_sweep_secs: u64 = parse_or("RBD_SESSION_SWEEP_SECS", 3600)?;
        let cooldown_sweep_secs: u64 = parse_or("RBD_COOLDOWN_SWEEP_SECS", 3600)?;
        let allow_rerequest: bool = parse_or("RBD_ALLOW_REREQUEST", false)?;

        Ok(Self {
            host,
            port,
            db_path,
            sessions: SessionConfig {
                ttl: Duration::from_secs(ttl_days * 24 * 60 * 60),
                sweep_interval: Duration::from_secs(session_sweep_secs.max(1)),
            },
            cooldown_sweep_interval: Duration::from_secs(cooldown_sweep_secs.max(1)),
            friend_policy: FriendPolicy {
                allow_rerequest_after_rejection: allow_rerequest,
            },
            push_url: non_empty("RBD_PUSH_URL"),
            push_key: non_empty("RBD_PUSH_KEY"),
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        _ => Ok(default),
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
