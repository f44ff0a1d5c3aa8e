mod common;

use std::sync::Arc;

use rbd_core::memory::MemoryStore;
use rbd_core::store::HistoryStore;
use rbd_core::{DispatchOutcome, FriendPolicy, HistoryOutcome, Stores};
use rbd_types::models::{History, UserId};

use common::{Harness, RecordingDispatcher};

struct BrokenHistory;

impl HistoryStore for BrokenHistory {
    fn insert_history(&self, _: &History) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }

    fn history_between(&self, _: UserId, _: UserId, _: usize, _: usize) -> anyhow::Result<(Vec<History>, usize)> {
        anyhow::bail!("disk full")
    }
}

#[tokio::test]
async fn history_failure_still_commits_trigger() {
    let store = Arc::new(MemoryStore::new());
    let mut stores = Stores::shared(store.clone());
    stores.history = Arc::new(BrokenHistory);
    let h = Harness::build_with(store, stores, FriendPolicy::default(), RecordingDispatcher::default());
    let (alice, bob) = h.befriend("alice", "bob");

    let outcome = h.engine.trigger(alice, bob).await.unwrap();
    assert!(matches!(outcome.history, HistoryOutcome::Failed(ref e) if e.contains("disk full")));
    assert!(!outcome.history_recorded());
    assert!(outcome.notification_sent());
    assert_eq!(h.store.cooldowns_between(alice, bob).unwrap().len(), 1);
}

#[tokio::test]
async fn dispatch_failure_still_commits_trigger() {
    let h = Harness::with_dispatcher(RecordingDispatcher::failing());
    let (alice, bob) = h.befriend("alice", "bob");

    let outcome = h.engine.trigger(alice, bob).await.unwrap();
    assert!(matches!(outcome.dispatch, DispatchOutcome::Failed(_)));
    assert_eq!(outcome.history, HistoryOutcome::Recorded);
    assert!(h.ledger.check_active(alice, bob).unwrap().is_some());
}
