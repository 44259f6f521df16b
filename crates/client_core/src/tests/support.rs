use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::Identity;
use tokio::sync::{broadcast, oneshot, Mutex};

use crate::{
    session_gate::{GateState, SessionGate},
    AllowlistDirectory, AuthError, CatalogSource, IdentityChange, IdentityProvider, SignUpOutcome,
};

pub struct TestIdentityProvider {
    session: Mutex<Option<Identity>>,
    changes: broadcast::Sender<IdentityChange>,
    probe_error: Option<String>,
    credentials: Mutex<HashMap<String, String>>,
}

impl TestIdentityProvider {
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            session: Mutex::new(None),
            changes,
            probe_error: None,
            credentials: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_session(identity: Identity) -> Arc<Self> {
        let provider = Self::new();
        *provider.session.try_lock().expect("fresh provider") = Some(identity);
        provider
    }

    pub fn with_probe_error(message: impl Into<String>) -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            session: Mutex::new(None),
            changes,
            probe_error: Some(message.into()),
            credentials: Mutex::new(HashMap::new()),
        })
    }

    pub async fn register(&self, email: &str, secret: &str) {
        self.credentials
            .lock()
            .await
            .insert(email.to_string(), secret.to_string());
    }

    /// Pushes an identity change as if the hosted service notified us.
    pub async fn emit(&self, identity: Option<Identity>) {
        *self.session.lock().await = identity.clone();
        let _ = self.changes.send(IdentityChange { identity });
    }
}

#[async_trait]
impl IdentityProvider for TestIdentityProvider {
    async fn current_session(&self) -> Result<Option<Identity>> {
        if let Some(message) = &self.probe_error {
            return Err(anyhow!(message.clone()));
        }
        Ok(self.session.lock().await.clone())
    }

    async fn sign_in(&self, email: &str, secret: &str) -> Result<Identity, AuthError> {
        let known = {
            let credentials = self.credentials.lock().await;
            credentials.get(email).map(String::as_str) == Some(secret)
        };
        if !known {
            return Err(AuthError::InvalidCredentials);
        }
        let identity = Identity::with_email(email);
        self.emit(Some(identity.clone())).await;
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, secret: &str) -> Result<SignUpOutcome, AuthError> {
        let mut credentials = self.credentials.lock().await;
        if credentials.contains_key(email) {
            return Err(AuthError::AlreadyExists);
        }
        if secret.len() < 6 {
            return Err(AuthError::WeakSecret);
        }
        credentials.insert(email.to_string(), secret.to_string());
        // No session until the email is verified.
        Ok(SignUpOutcome::VerificationPending)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.emit(None).await;
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<IdentityChange> {
        self.changes.subscribe()
    }
}

pub struct TestAllowlist {
    authorized: Vec<String>,
    fail_with: Option<String>,
    lookups: Mutex<u32>,
    holds: Mutex<HashMap<String, oneshot::Receiver<bool>>>,
}

impl TestAllowlist {
    pub fn allowing(emails: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            authorized: emails.iter().map(|e| e.to_string()).collect(),
            fail_with: None,
            lookups: Mutex::new(0),
            holds: Mutex::new(HashMap::new()),
        })
    }

    pub fn failing(message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            authorized: Vec::new(),
            fail_with: Some(message.into()),
            lookups: Mutex::new(0),
            holds: Mutex::new(HashMap::new()),
        })
    }

    pub async fn lookup_count(&self) -> u32 {
        *self.lookups.lock().await
    }

    /// Blocks the next lookup for `email` until the returned sender fires;
    /// the sent value becomes the lookup result.
    pub async fn hold(&self, email: &str) -> oneshot::Sender<bool> {
        let (tx, rx) = oneshot::channel();
        self.holds.lock().await.insert(email.to_string(), rx);
        tx
    }
}

#[async_trait]
impl AllowlistDirectory for TestAllowlist {
    async fn is_email_authorized(&self, email: &str) -> Result<bool> {
        *self.lookups.lock().await += 1;
        let held = self.holds.lock().await.remove(email);
        if let Some(rx) = held {
            return Ok(rx.await.unwrap_or(false));
        }
        if let Some(message) = &self.fail_with {
            return Err(anyhow!(message.clone()));
        }
        Ok(self.authorized.iter().any(|e| e == email))
    }

    async fn authorized_emails(&self) -> Result<Vec<String>> {
        if let Some(message) = &self.fail_with {
            return Err(anyhow!(message.clone()));
        }
        let mut emails = self.authorized.clone();
        emails.sort();
        Ok(emails)
    }
}

pub struct StaticCatalogSource {
    body: Option<serde_json::Value>,
    fail_with: Option<String>,
    fetches: Mutex<u32>,
}

impl StaticCatalogSource {
    pub fn returning(body: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            body: Some(body),
            fail_with: None,
            fetches: Mutex::new(0),
        })
    }

    pub fn failing(message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            body: None,
            fail_with: Some(message.into()),
            fetches: Mutex::new(0),
        })
    }

    pub async fn fetch_count(&self) -> u32 {
        *self.fetches.lock().await
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch_catalog(&self) -> Result<serde_json::Value> {
        *self.fetches.lock().await += 1;
        if let Some(message) = &self.fail_with {
            return Err(anyhow!(message.clone()));
        }
        Ok(self.body.clone().expect("source configured with a body"))
    }
}

pub async fn wait_for_state(gate: &SessionGate, pred: impl Fn(&GateState) -> bool) -> GateState {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let state = gate.state().await;
            if pred(&state) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for gate state")
}

pub fn sheet_row(title: &str, websites: [&str; 4]) -> serde_json::Value {
    serde_json::json!({
        "": title,
        "linkATool": "Dualite",
        "linkAWebsite": websites[0],
        "linkBTool": "Lovable",
        "linkBWebsite": websites[1],
        "linkCTool": "Bolt",
        "linkCWebsite": websites[2],
        "linkDTool": "v0",
        "linkDWebsite": websites[3],
    })
}
