#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::future::BoxFuture;
use uuid::Uuid;

use rbd_core::memory::MemoryStore;
use rbd_core::store::PushDispatcher;
use rbd_core::{CooldownLedger, FriendPolicy, FriendService, Stores, TriggerEngine};
use rbd_types::events::PushMessage;
use rbd_types::models::{User, UserId};

/// Dispatcher that records every message, or fails every send.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub sent: Mutex<Vec<(String, PushMessage)>>,
    pub fail: bool,
}

impl RecordingDispatcher {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl PushDispatcher for RecordingDispatcher {
    fn send<'a>(&'a self, token: &'a str, message: &'a PushMessage) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            if self.fail {
                anyhow::bail!("gateway unavailable");
            }
            self.sent.lock().unwrap().push((token.to_string(), message.clone()));
            Ok(())
        })
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub stores: Stores,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub ledger: CooldownLedger,
    pub friends: FriendService,
    pub engine: TriggerEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(FriendPolicy::default(), RecordingDispatcher::default())
    }

    pub fn with_policy(policy: FriendPolicy) -> Self {
        Self::build(policy, RecordingDispatcher::default())
    }

    pub fn with_dispatcher(dispatcher: RecordingDispatcher) -> Self {
        Self::build(FriendPolicy::default(), dispatcher)
    }

    pub fn build(policy: FriendPolicy, dispatcher: RecordingDispatcher) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::build_with(store.clone(), Stores::shared(store), policy, dispatcher)
    }

    /// `stores` may wrap `store` with failing decorators.
    pub fn build_with(
        store: Arc<MemoryStore>,
        stores: Stores,
        policy: FriendPolicy,
        dispatcher: RecordingDispatcher,
    ) -> Self {
        let dispatcher = Arc::new(dispatcher);
        let ledger = CooldownLedger::new(stores.cooldowns.clone());
        let friends = FriendService::new(stores.clone(), ledger.clone(), policy);
        let engine = TriggerEngine::new(stores.clone(), ledger.clone(), dispatcher.clone());
        Self {
            store,
            stores,
            dispatcher,
            ledger,
            friends,
            engine,
        }
    }

    pub fn user(&self, name: &str) -> UserId {
        let user = User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            password_hash: String::new(),
            push_token: Some(format!("device-{}", name)),
            created_at: Utc::now(),
            muted_all: false,
        };
        assert!(self.stores.users.insert_user(&user).unwrap());
        user.id
    }

    /// Two users who are already friends.
    pub fn befriend(&self, a: &str, b: &str) -> (UserId, UserId) {
        let (ua, ub) = (self.user(a), self.user(b));
        let request = self.friends.send_request(ua, ub).unwrap();
        self.friends.accept(ub, request).unwrap();
        (ua, ub)
    }
}
