use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::{config::Settings, CatalogSource};

/// Fetches the game catalog from the public spreadsheet endpoint with a
/// single unauthenticated GET.
pub struct SheetCatalogSource {
    http: Client,
    url: String,
}

impl SheetCatalogSource {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            url: settings.catalog_url.clone(),
        })
    }
}

#[async_trait]
impl CatalogSource for SheetCatalogSource {
    async fn fetch_catalog(&self) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("catalog request failed")?
            .error_for_status()
            .context("catalog endpoint returned an error status")?;
        let body = response
            .json()
            .await
            .context("catalog response is not valid JSON")?;
        Ok(body)
    }
}
