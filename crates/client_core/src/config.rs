use std::{collections::HashMap, fs, time::Duration};

use crate::error::ConfigError;

/// Public spreadsheet endpoint serving the game catalog.
pub const DEFAULT_CATALOG_URL: &str =
    "https://api.sheety.co/d4bd5bfc74b79f01d2aa0ff23c52bdca/dualiteEvent/sheet1";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the hosted auth/database service. Required.
    pub service_url: String,
    /// API key for the hosted service. Required.
    pub service_key: String,
    pub catalog_url: String,
    pub request_timeout: Duration,
}

/// Loads settings from `showcase.toml` (if present) with `SHOWCASE_*`
/// environment overrides. The two service values have no defaults; their
/// absence is a startup error.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let mut file_cfg = HashMap::new();
    if let Ok(raw) = fs::read_to_string("showcase.toml") {
        if let Ok(parsed) = toml::from_str::<HashMap<String, String>>(&raw) {
            file_cfg = parsed;
        }
    }
    settings_from(file_cfg, |key| std::env::var(key).ok())
}

pub fn settings_from(
    file_cfg: HashMap<String, String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, ConfigError> {
    let value = |env_key: &str, file_key: &str| -> Option<String> {
        env(env_key)
            .or_else(|| file_cfg.get(file_key).cloned())
            .filter(|v| !v.trim().is_empty())
    };

    let service_url = value("SHOWCASE_SERVICE_URL", "service_url")
        .ok_or(ConfigError::MissingValue { key: "service_url" })?;
    let service_key = value("SHOWCASE_SERVICE_KEY", "service_key")
        .ok_or(ConfigError::MissingValue { key: "service_key" })?;

    let catalog_url =
        value("SHOWCASE_CATALOG_URL", "catalog_url").unwrap_or_else(|| DEFAULT_CATALOG_URL.into());

    let request_timeout = match value("SHOWCASE_REQUEST_TIMEOUT_SECS", "request_timeout_secs") {
        Some(raw) => {
            let secs = raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "request_timeout_secs",
                value: raw,
            })?;
            Duration::from_secs(secs)
        }
        None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
    };

    Ok(Settings {
        service_url,
        service_key,
        catalog_url,
        request_timeout,
    })
}
