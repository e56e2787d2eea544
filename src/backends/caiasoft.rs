//! CaiaSoft inventory client
//!
//! Secondary availability check for Clancy-managed locations.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::CaiasoftConfig;
use crate::error::{AppError, AppResult};

/// The status meaning "on the shelf and requestable".
pub const ITEM_IN_AT_REST: &str = "Item In at Rest";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaiasoftBackend: Send + Sync {
    /// Inventory status for a single barcode.
    async fn item_status(&self, barcode: &str) -> AppResult<String>;
}

#[derive(Debug, Deserialize)]
struct ItemStatusResponse {
    #[serde(default)]
    status: String,
}

/// HTTP client against the CaiaSoft portal API.
pub struct CaiasoftHttp {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CaiasoftHttp {
    pub fn new(config: &CaiasoftConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Configuration(format!("caiasoft client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CaiasoftBackend for CaiasoftHttp {
    async fn item_status(&self, barcode: &str) -> AppResult<String> {
        let url = format!(
            "{}/itemstatus/v1/{}",
            self.base_url,
            urlencoding::encode(barcode)
        );
        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Backend(format!(
                "CaiaSoft returned status {}",
                response.status()
            )));
        }
        let body: ItemStatusResponse = response.json().await?;
        Ok(body.status)
    }
}
