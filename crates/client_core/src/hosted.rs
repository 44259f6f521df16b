//! HTTP implementations of the identity and allowlist collaborators against
//! the hosted auth/database service's REST surface.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use shared::{
    domain::Identity,
    protocol::{AllowlistRow, AuthErrorPayload, SessionPayload},
};
use tokio::sync::{broadcast, Mutex};
use url::Url;

use crate::{
    config::Settings, AllowlistDirectory, AuthError, IdentityChange, IdentityProvider,
    SignUpOutcome,
};

const ALLOWLIST_TABLE_PATH: &str = "/rest/v1/authorized_users";

#[derive(Debug, Serialize)]
struct CredentialsRequest {
    email: String,
    password: String,
}

struct HostedSession {
    identity: Identity,
    access_token: String,
}

pub struct HostedIdentityProvider {
    http: Client,
    base_url: Url,
    api_key: String,
    /// Session state is in-memory only; nothing is persisted across runs.
    session: Mutex<Option<HostedSession>>,
    changes: broadcast::Sender<IdentityChange>,
}

impl HostedIdentityProvider {
    pub fn new(settings: &Settings) -> Result<Self> {
        let base_url = Url::parse(&settings.service_url).context("invalid service_url")?;
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("failed to build http client")?;
        let (changes, _) = broadcast::channel(16);
        Ok(Self {
            http,
            base_url,
            api_key: settings.service_key.clone(),
            session: Mutex::new(None),
            changes,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|err| AuthError::Network(err.to_string()))
    }

    async fn establish_session(&self, payload: SessionPayload) -> Identity {
        let identity = Identity {
            email: payload.user.and_then(|user| user.email),
        };
        {
            let mut session = self.session.lock().await;
            *session = Some(HostedSession {
                identity: identity.clone(),
                access_token: payload.access_token.unwrap_or_default(),
            });
        }
        let _ = self.changes.send(IdentityChange {
            identity: Some(identity.clone()),
        });
        identity
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentityProvider {
    async fn current_session(&self) -> Result<Option<Identity>> {
        let session = self.session.lock().await;
        Ok(session.as_ref().map(|s| s.identity.clone()))
    }

    async fn sign_in(&self, email: &str, secret: &str) -> Result<Identity, AuthError> {
        let mut url = self.endpoint("/auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&CredentialsRequest {
                email: email.to_string(),
                password: secret.to_string(),
            })
            .send()
            .await
            .map_err(|err| AuthError::Network(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let payload: SessionPayload = response
                .json()
                .await
                .map_err(|err| AuthError::Network(err.to_string()))?;
            return Ok(self.establish_session(payload).await);
        }

        let body: AuthErrorPayload = response.json().await.unwrap_or_default();
        if status.is_client_error() {
            Err(AuthError::InvalidCredentials)
        } else {
            Err(AuthError::Network(body.message()))
        }
    }

    async fn sign_up(&self, email: &str, secret: &str) -> Result<SignUpOutcome, AuthError> {
        let url = self.endpoint("/auth/v1/signup")?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&CredentialsRequest {
                email: email.to_string(),
                password: secret.to_string(),
            })
            .send()
            .await
            .map_err(|err| AuthError::Network(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let payload: SessionPayload = response
                .json()
                .await
                .map_err(|err| AuthError::Network(err.to_string()))?;
            // The service withholds the session until the email is verified.
            if payload.access_token.as_deref().is_some_and(|t| !t.is_empty()) {
                self.establish_session(payload).await;
                return Ok(SignUpOutcome::SessionEstablished);
            }
            return Ok(SignUpOutcome::VerificationPending);
        }

        let body: AuthErrorPayload = response.json().await.unwrap_or_default();
        let code = body.error_code.as_deref().unwrap_or_default();
        let message = body.message();
        let lowered = message.to_ascii_lowercase();
        if code == "user_already_exists" || lowered.contains("already registered") {
            Err(AuthError::AlreadyExists)
        } else if code == "weak_password" || lowered.contains("password") {
            Err(AuthError::WeakSecret)
        } else {
            Err(AuthError::Network(message))
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = {
            let session = self.session.lock().await;
            session.as_ref().map(|s| s.access_token.clone())
        };

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let url = self.endpoint("/auth/v1/logout")?;
            self.http
                .post(url)
                .header("apikey", &self.api_key)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|err| AuthError::Network(err.to_string()))?;
        }

        {
            let mut session = self.session.lock().await;
            *session = None;
        }
        let _ = self.changes.send(IdentityChange { identity: None });
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<IdentityChange> {
        self.changes.subscribe()
    }
}

pub struct HostedAllowlistDirectory {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl HostedAllowlistDirectory {
    pub fn new(settings: &Settings) -> Result<Self> {
        let base_url = Url::parse(&settings.service_url).context("invalid service_url")?;
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url,
            api_key: settings.service_key.clone(),
        })
    }

    async fn query_rows(&self, query: &[(&str, &str)]) -> Result<Vec<AllowlistRow>> {
        let url = self
            .base_url
            .join(ALLOWLIST_TABLE_PATH)
            .context("invalid allowlist URL")?;
        let rows = self
            .http
            .get(url)
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("allowlist request failed")?
            .error_for_status()
            .context("allowlist lookup rejected")?
            .json()
            .await
            .context("allowlist response malformed")?;
        Ok(rows)
    }
}

#[async_trait]
impl AllowlistDirectory for HostedAllowlistDirectory {
    async fn is_email_authorized(&self, email: &str) -> Result<bool> {
        let filter = format!("eq.{email}");
        let rows = self
            .query_rows(&[("select", "email"), ("email", filter.as_str())])
            .await?;
        Ok(!rows.is_empty())
    }

    async fn authorized_emails(&self) -> Result<Vec<String>> {
        let rows = self
            .query_rows(&[("select", "email"), ("order", "email")])
            .await?;
        Ok(rows.into_iter().map(|row| row.email).collect())
    }
}
