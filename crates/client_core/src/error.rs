use thiserror::Error;

/// Missing or malformed required configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration value: {key}")]
    MissingValue { key: &'static str },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Failures of the identity collaborator's sign-in/sign-up/sign-out
/// operations. Never fatal; surfaced as inline form messages.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("an account with this email already exists")]
    AlreadyExists,
    #[error("secret does not meet strength requirements")]
    WeakSecret,
    #[error("identity service error: {0}")]
    Network(String),
}

/// A failed catalog fetch. Non-fatal: the catalog falls back to placeholder
/// data and the message is shown as a banner.
#[derive(Debug, Clone, Error)]
pub enum CatalogFetchError {
    #[error("{0}")]
    Transport(String),
    #[error("response body is not valid JSON: {0}")]
    Malformed(String),
    #[error("no array of game records found in response")]
    NoRecordArray,
}
