//! Friendship, cooldown and trigger logic for Return By Death.
//!
//! Services here depend only on the collaborator traits in [`store`]; the
//! SQLite backend lives in `rbd-db` and [`memory::MemoryStore`] backs tests.

pub mod auth;
pub mod cooldown;
pub mod error;
pub mod friends;
pub mod memory;
pub mod role;
pub mod session;
pub mod store;
pub mod sweeper;
pub mod trigger;

use chrono::{DateTime, SubsecRound, Utc};

pub use auth::{AuthService, Session};
pub use cooldown::CooldownLedger;
pub use error::{CoreError, CoreResult};
pub use friends::{FriendPolicy, FriendService};
pub use session::{SessionConfig, SessionStore};
pub use store::Stores;
pub use sweeper::Sweeper;
pub use trigger::{CooldownStatus, DispatchOutcome, HistoryOutcome, TriggerEngine, TriggerOutcome};

/// Current time at the millisecond precision every backend stores.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Runs synchronous store work on the blocking pool so a busy database never
/// stalls the async workers.
pub(crate) async fn blocking<F, T>(f: F) -> CoreResult<T>
where
    F: FnOnce() -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("blocking task failed: {}", e))?
}
