//! Shared fixtures: identities, sessions and a scripted provider whose
//! admin checks can be held open to force out-of-order completion.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use crate::error::ProviderError;
use crate::provider::{IdentityProvider, Subscription, SubscriptionId};
use crate::types::{AuthChange, AuthEvent, Identity, Session, Snapshot};

#[must_use]
pub fn identity(email: &str) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: email.to_owned(),
        created_at: OffsetDateTime::now_utc() - time::Duration::days(30),
        last_sign_in_at: Some(OffsetDateTime::now_utc()),
    }
}

#[must_use]
pub fn session_of(identity: &Identity) -> Session {
    Session {
        identity: identity.clone(),
        access_token: format!("access-{}", Uuid::new_v4()),
        refresh_token: format!("refresh-{}", Uuid::new_v4()),
        expires_at: OffsetDateTime::now_utc() + time::Duration::hours(1),
    }
}

#[must_use]
pub fn session_for(email: &str) -> Session {
    session_of(&identity(email))
}

/// What `sign_out` does after being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutBehavior {
    /// Push a `SignedOut` notification with no session.
    Acknowledge,
    /// Report success but never notify.
    Silent,
    Fail,
}

struct Script {
    current: Result<Option<Session>, ProviderError>,
    fetch_gate: Option<oneshot::Receiver<()>>,
    admin: HashMap<Uuid, Result<bool, ProviderError>>,
    admin_gates: HashMap<Uuid, VecDeque<oneshot::Receiver<()>>>,
    sign_out: SignOutBehavior,
    subscribers: HashMap<SubscriptionId, mpsc::UnboundedSender<AuthChange>>,
    next_subscription: u64,
}

/// Provider double driven entirely by the test.
pub struct ScriptedProvider {
    script: Mutex<Script>,
    admin_calls: AtomicUsize,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                current: Ok(None),
                fetch_gate: None,
                admin: HashMap::new(),
                admin_gates: HashMap::new(),
                sign_out: SignOutBehavior::Acknowledge,
                subscribers: HashMap::new(),
                next_subscription: 0,
            }),
            admin_calls: AtomicUsize::new(0),
        })
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("script mutex should lock")
    }

    pub fn set_current(&self, current: Result<Option<Session>, ProviderError>) {
        self.script().current = current;
    }

    pub fn set_admin(&self, identity_id: Uuid, answer: Result<bool, ProviderError>) {
        self.script().admin.insert(identity_id, answer);
    }

    pub fn set_sign_out(&self, behavior: SignOutBehavior) {
        self.script().sign_out = behavior;
    }

    /// Hold the next initial fetch until the returned sender fires (or drops).
    #[must_use]
    pub fn gate_fetch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script().fetch_gate = Some(rx);
        tx
    }

    /// Hold the next admin check for `identity_id` until the returned sender
    /// fires (or drops). Gates queue per identity.
    #[must_use]
    pub fn gate_admin(&self, identity_id: Uuid) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script().admin_gates.entry(identity_id).or_default().push_back(rx);
        tx
    }

    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        let change = AuthChange { event, session };
        self.script().subscribers.retain(|_, tx| tx.send(change.clone()).is_ok());
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.script().subscribers.len()
    }

    #[must_use]
    pub fn admin_calls(&self) -> usize {
        self.admin_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn get_current_session(&self) -> Result<Option<Session>, ProviderError> {
        let gate = self.script().fetch_gate.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.script().current.clone()
    }

    async fn exchange_code_for_session(&self, _code: &str) -> Result<Session, ProviderError> {
        Err(ProviderError::InvalidCode)
    }

    fn subscribe(&self) -> Subscription {
        let (tx, events) = mpsc::unbounded_channel();
        let mut script = self.script();
        script.next_subscription += 1;
        let id = SubscriptionId(script.next_subscription);
        script.subscribers.insert(id, tx);
        Subscription { id, events }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.script().subscribers.remove(&id);
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let behavior = self.script().sign_out;
        match behavior {
            SignOutBehavior::Acknowledge => {
                self.script().current = Ok(None);
                self.emit(AuthEvent::SignedOut, None);
                Ok(())
            }
            SignOutBehavior::Silent => Ok(()),
            SignOutBehavior::Fail => Err(ProviderError::Unreachable),
        }
    }

    async fn check_is_administrator(&self, identity_id: Uuid) -> Result<bool, ProviderError> {
        self.admin_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self
            .script()
            .admin_gates
            .get_mut(&identity_id)
            .and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.script().admin.get(&identity_id).cloned().unwrap_or(Ok(false))
    }
}

/// Wait until a published snapshot satisfies `pred`, with a test timeout.
pub async fn wait_for_snapshot<F>(rx: &mut watch::Receiver<Snapshot>, pred: F) -> Snapshot
where
    F: FnMut(&Snapshot) -> bool,
{
    tokio::time::timeout(Duration::from_millis(500), rx.wait_for(pred))
        .await
        .expect("snapshot wait timed out")
        .expect("snapshot channel closed")
        .clone()
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}
