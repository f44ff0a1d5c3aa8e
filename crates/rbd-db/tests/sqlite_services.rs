use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use futures_util::future::BoxFuture;
use uuid::Uuid;

use rbd_core::store::{ConditionalInsert, CooldownStore, PushDispatcher, UserStore};
use rbd_core::{
    AuthService, CooldownLedger, CoreError, FriendPolicy, FriendService, SessionConfig, SessionStore, Stores,
    TriggerEngine,
};
use rbd_db::Database;
use rbd_types::events::PushMessage;
use rbd_types::models::{Cooldown, User, UserId};

#[derive(Default)]
struct CountingDispatcher {
    sent: Mutex<usize>,
}

impl PushDispatcher for CountingDispatcher {
    fn send<'a>(&'a self, _: &'a str, _: &'a PushMessage) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            *self.sent.lock().unwrap() += 1;
            Ok(())
        })
    }
}

fn open(dir: &tempfile::TempDir) -> Arc<Database> {
    Arc::new(Database::open(&dir.path().join("rbd.db")).unwrap())
}

fn user(db: &Database, name: &str) -> UserId {
    let user = User {
        id: Uuid::new_v4(),
        username: name.to_string(),
        password_hash: String::new(),
        push_token: Some(format!("device-{}", name)),
        created_at: Utc::now(),
        muted_all: false,
    };
    assert!(db.insert_user(&user).unwrap());
    user.id
}

#[test]
fn migrations_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let db = open(&dir);
        user(&db, "alice")
    };

    let db = open(&dir);
    assert_eq!(db.user_by_id(id).unwrap().unwrap().username, "alice");
}

#[test]
fn threaded_cooldown_inserts_commit_once() {
    const THREADS: usize = 8;

    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let db = db.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let now = Utc::now();
                let record = Cooldown {
                    id: Uuid::new_v4(),
                    initiator: a,
                    target: b,
                    triggered_at: now,
                    expires_at: now + TimeDelta::minutes(60),
                };
                barrier.wait();
                db.insert_cooldown_if_idle(&record).unwrap()
            })
        })
        .collect();

    let inserted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|r| *r == ConditionalInsert::Inserted)
        .count();

    assert_eq!(inserted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn trigger_flow_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);
    let stores = Stores::shared(db.clone());
    let ledger = CooldownLedger::new(stores.cooldowns.clone());
    let dispatcher = Arc::new(CountingDispatcher::default());
    let friends = FriendService::new(stores.clone(), ledger.clone(), FriendPolicy::default());
    let engine = TriggerEngine::new(stores.clone(), ledger, dispatcher.clone());

    let alice = user(&db, "alice");
    let bob = user(&db, "bob");
    let request = friends.send_request(alice, bob).unwrap();
    friends.accept(bob, request).unwrap();
    friends.set_cooldown(bob, alice, 30).unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move { engine.trigger(alice, bob).await }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => outcomes.push(outcome),
            Err(CoreError::CooldownActive { .. }) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert_eq!(
        outcome.next_available_at,
        outcome.cooldown.triggered_at + TimeDelta::minutes(30)
    );
    assert!(outcome.history_recorded());
    assert_eq!(*dispatcher.sent.lock().unwrap(), 1);

    let (history, total) = friends.history_with(bob, alice, 1, 50).unwrap();
    assert_eq!(total, 1);
    assert_eq!(history[0].sender_username, "alice");
}

/// Holds the connection from another thread for `hold`, returning once the
/// lock is taken.
fn hold_connection(db: &Arc<Database>, hold: Duration) -> thread::JoinHandle<()> {
    let (locked_tx, locked_rx) = mpsc::channel();
    let db = db.clone();
    let handle = thread::spawn(move || {
        db.with_conn(|_| {
            locked_tx.send(()).unwrap();
            thread::sleep(hold);
            Ok(())
        })
        .unwrap();
    });
    locked_rx.recv().unwrap();
    handle
}

/// Counts 10ms ticks on the current runtime until aborted.
fn spawn_ticker() -> (Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();
    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });
    (ticks, handle)
}

#[tokio::test]
async fn trigger_waits_for_database_off_the_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);
    let stores = Stores::shared(db.clone());
    let ledger = CooldownLedger::new(stores.cooldowns.clone());
    let friends = FriendService::new(stores.clone(), ledger.clone(), FriendPolicy::default());
    let engine = TriggerEngine::new(stores, ledger, Arc::new(CountingDispatcher::default()));

    let alice = user(&db, "alice");
    let bob = user(&db, "bob");
    let request = friends.send_request(alice, bob).unwrap();
    friends.accept(bob, request).unwrap();

    let (ticks, ticker) = spawn_ticker();
    let holder = hold_connection(&db, Duration::from_millis(400));

    let outcome = engine.trigger(alice, bob).await.unwrap();
    ticker.abort();
    holder.join().unwrap();

    assert!(outcome.history_recorded());
    // a single-threaded runtime only ticks if the trigger yielded while blocked
    assert!(ticks.load(Ordering::Relaxed) >= 10, "runtime stalled while the connection was held");
}

#[tokio::test]
async fn login_waits_for_database_off_the_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);
    let auth = AuthService::new(db.clone(), SessionStore::new(SessionConfig::default()));
    auth.register("alice", "secret123").await.unwrap();

    let (ticks, ticker) = spawn_ticker();
    let holder = hold_connection(&db, Duration::from_millis(400));

    let session = auth.login("alice", "secret123").await.unwrap();
    ticker.abort();
    holder.join().unwrap();

    assert_eq!(session.username, "alice");
    assert!(ticks.load(Ordering::Relaxed) >= 10, "runtime stalled while the connection was held");
}
