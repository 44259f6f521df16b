use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::Identity;
use tokio::sync::broadcast;

pub mod catalog;
pub mod config;
pub mod error;
pub mod hosted;
pub mod session_gate;
pub mod sheet;
pub mod shell;

pub use catalog::{CatalogStatus, GameCatalog};
pub use config::{load_settings, Settings};
pub use error::{AuthError, CatalogFetchError, ConfigError};
pub use hosted::{HostedAllowlistDirectory, HostedIdentityProvider};
pub use session_gate::{GateEvent, GateState, SessionGate};
pub use sheet::SheetCatalogSource;
pub use shell::{GameView, PresentationShell, SlotStatus, SlotView, View};

/// A change of the current identity: `Some` after sign-in or token refresh,
/// `None` after sign-out or session expiry.
#[derive(Debug, Clone)]
pub struct IdentityChange {
    pub identity: Option<Identity>,
}

/// Outcome of a successful sign-up request. The hosted service withholds a
/// session until the email is verified, so a fresh account normally lands in
/// `VerificationPending` rather than an authenticated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOutcome {
    SessionEstablished,
    VerificationPending,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the existing session, if any. Transport failures here are
    /// not fatal; callers treat them as "no session".
    async fn current_session(&self) -> Result<Option<Identity>>;
    async fn sign_in(&self, email: &str, secret: &str) -> Result<Identity, AuthError>;
    async fn sign_up(&self, email: &str, secret: &str) -> Result<SignUpOutcome, AuthError>;
    async fn sign_out(&self) -> Result<(), AuthError>;
    /// Identity-change notifications. Implementations must emit a change for
    /// every successful sign-in, sign-up that established a session, and
    /// sign-out. Dropping the receiver ends the subscription.
    fn subscribe_changes(&self) -> broadcast::Receiver<IdentityChange>;
}

#[async_trait]
pub trait AllowlistDirectory: Send + Sync {
    /// Whether the email is present in the authorized-users table.
    async fn is_email_authorized(&self, email: &str) -> Result<bool>;
    /// All authorized emails, sorted by the collaborator. Admin surface.
    async fn authorized_emails(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetches the raw catalog document. The wrapping of the record array is
    /// not contractually fixed upstream, so this returns untyped JSON.
    async fn fetch_catalog(&self) -> Result<serde_json::Value>;
}

pub struct MissingIdentityProvider;

#[async_trait]
impl IdentityProvider for MissingIdentityProvider {
    async fn current_session(&self) -> Result<Option<Identity>> {
        Err(anyhow!("identity service is unavailable"))
    }

    async fn sign_in(&self, _email: &str, _secret: &str) -> Result<Identity, AuthError> {
        Err(AuthError::Network("identity service is unavailable".into()))
    }

    async fn sign_up(&self, _email: &str, _secret: &str) -> Result<SignUpOutcome, AuthError> {
        Err(AuthError::Network("identity service is unavailable".into()))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Err(AuthError::Network("identity service is unavailable".into()))
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<IdentityChange> {
        let (_tx, rx) = broadcast::channel(1);
        rx
    }
}

pub struct MissingAllowlistDirectory;

#[async_trait]
impl AllowlistDirectory for MissingAllowlistDirectory {
    async fn is_email_authorized(&self, email: &str) -> Result<bool> {
        Err(anyhow!("allowlist directory unavailable for {email}"))
    }

    async fn authorized_emails(&self) -> Result<Vec<String>> {
        Err(anyhow!("allowlist directory is unavailable"))
    }
}

pub struct MissingCatalogSource;

#[async_trait]
impl CatalogSource for MissingCatalogSource {
    async fn fetch_catalog(&self) -> Result<serde_json::Value> {
        Err(anyhow!("catalog source is unavailable"))
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod tests_support;

#[cfg(test)]
#[path = "tests/session_gate_tests.rs"]
mod session_gate_tests;

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod catalog_tests;

#[cfg(test)]
#[path = "tests/shell_tests.rs"]
mod shell_tests;

#[cfg(test)]
#[path = "tests/hosted_tests.rs"]
mod hosted_tests;
