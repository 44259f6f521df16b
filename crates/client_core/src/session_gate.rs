use std::sync::Arc;

use shared::domain::Identity;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{AllowlistDirectory, AuthError, IdentityProvider, SignUpOutcome};

/// Where the session currently stands. Content must never be rendered
/// before `Authorized`; `Checking` and `CheckingAuthorization` require a
/// blocking loading view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// Probing the identity collaborator for an existing session.
    Checking,
    Unauthenticated,
    /// A session with an email exists; the allowlist lookup is in flight.
    CheckingAuthorization { email: String },
    /// Authenticated but not on the allowlist. `email` is `None` for
    /// sessions that carry no email at all (those never get a lookup).
    Unauthorized { email: Option<String> },
    Authorized { email: String },
}

impl GateState {
    pub fn blocks_content(&self) -> bool {
        matches!(
            self,
            GateState::Checking | GateState::CheckingAuthorization { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub enum GateEvent {
    StateChanged(GateState),
}

struct GateInner {
    state: GateState,
    /// Bumped on every identity change; allowlist lookups are tagged with
    /// the epoch they were issued under, and a result whose epoch no longer
    /// matches is discarded so only the latest identity wins.
    epoch: u64,
}

/// Resolves the current identity plus an allowlist decision into a single
/// gate state, re-running the decision on every identity change.
///
/// The gate is an explicit context object: consumers hold an `Arc` and
/// subscribe to [`GateEvent`]s; dropping the receiver unsubscribes, and
/// [`SessionGate::shutdown`] stops the identity-change listener.
pub struct SessionGate {
    identity: Arc<dyn IdentityProvider>,
    allowlist: Arc<dyn AllowlistDirectory>,
    inner: Mutex<GateInner>,
    events: broadcast::Sender<GateEvent>,
    listen_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionGate {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        allowlist: Arc<dyn AllowlistDirectory>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            identity,
            allowlist,
            inner: Mutex::new(GateInner {
                state: GateState::Checking,
                epoch: 0,
            }),
            events,
            listen_task: Mutex::new(None),
        })
    }

    /// Probes for an existing session and starts listening for identity
    /// changes. Returns once the initial probe has been applied (the
    /// resulting allowlist lookup may still be in flight).
    pub async fn start(self: &Arc<Self>) {
        let mut changes = self.identity.subscribe_changes();
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Ok(change) = changes.recv().await {
                let Some(gate) = weak.upgrade() else {
                    break;
                };
                gate.apply_identity(change.identity).await;
            }
        });
        {
            let mut guard = self.listen_task.lock().await;
            if let Some(previous) = guard.replace(task) {
                previous.abort();
            }
        }

        let session = match self.identity.current_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!("session probe failed, treating as signed out: {err}");
                None
            }
        };
        self.apply_identity(session).await;
    }

    /// Stops the identity-change listener. In-flight lookups finish on
    /// their own and are discarded if the epoch has moved on.
    pub async fn shutdown(&self) {
        if let Some(task) = self.listen_task.lock().await.take() {
            task.abort();
        }
    }

    pub async fn state(&self) -> GateState {
        self.inner.lock().await.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.events.subscribe()
    }

    pub async fn sign_in(&self, email: &str, secret: &str) -> Result<(), AuthError> {
        self.identity.sign_in(email, secret).await.map(|_| ())
    }

    pub async fn sign_up(&self, email: &str, secret: &str) -> Result<SignUpOutcome, AuthError> {
        self.identity.sign_up(email, secret).await
    }

    /// Requests sign-out from the identity collaborator. The transition to
    /// `Unauthenticated` arrives through the identity-change subscription.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.identity.sign_out().await
    }

    async fn apply_identity(self: &Arc<Self>, identity: Option<Identity>) {
        let issued = {
            let mut inner = self.inner.lock().await;
            inner.epoch += 1;
            match identity {
                None => {
                    inner.state = GateState::Unauthenticated;
                    self.emit(&inner.state);
                    return;
                }
                Some(identity) => match identity.email {
                    // No email means no lookup: fail closed immediately.
                    None => {
                        inner.state = GateState::Unauthorized { email: None };
                        self.emit(&inner.state);
                        return;
                    }
                    Some(email) => {
                        inner.state = GateState::CheckingAuthorization {
                            email: email.clone(),
                        };
                        self.emit(&inner.state);
                        (inner.epoch, email)
                    }
                },
            }
        };

        let (epoch, email) = issued;
        let allowlist = Arc::clone(&self.allowlist);
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let authorized = match allowlist.is_email_authorized(&email).await {
                Ok(authorized) => authorized,
                Err(err) => {
                    // Fail closed: a lookup error denies access rather than
                    // surfacing a distinct user-facing error state.
                    warn!("authorization lookup failed for {email}: {err}");
                    false
                }
            };
            if let Some(gate) = weak.upgrade() {
                gate.finish_lookup(epoch, email, authorized).await;
            }
        });
    }

    async fn finish_lookup(&self, epoch: u64, email: String, authorized: bool) {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            info!("discarding stale authorization result for {email}");
            return;
        }
        inner.state = if authorized {
            GateState::Authorized { email }
        } else {
            GateState::Unauthorized { email: Some(email) }
        };
        self.emit(&inner.state);
    }

    fn emit(&self, state: &GateState) {
        let _ = self.events.send(GateEvent::StateChanged(state.clone()));
    }
}
