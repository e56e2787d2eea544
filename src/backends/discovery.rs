//! Record source: the discovery system serving raw MARC records.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

use crate::config::DiscoveryConfig;
use crate::error::{AppError, AppResult};

/// Lookup of raw bibliographic records by bib id or item barcode.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    /// Raw MARC for a bib id, or None when the id is unknown.
    async fn lookup_bib(&self, bib_id: &str) -> AppResult<Option<Vec<u8>>>;

    /// Raw MARC for the record holding an item barcode, or None.
    async fn lookup_barcode(&self, barcode: &str) -> AppResult<Option<Vec<u8>>>;
}

/// HTTP client against the discovery service's raw-MARC endpoint.
pub struct HttpDiscovery {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDiscovery {
    pub fn new(config: &DiscoveryConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Configuration(format!("discovery client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_marc(&self, path: String) -> AppResult<Option<Vec<u8>>> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("discovery lookup {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::Backend(format!(
                "discovery returned status {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some(body.to_vec()))
    }
}

#[async_trait]
impl DiscoveryBackend for HttpDiscovery {
    async fn lookup_bib(&self, bib_id: &str) -> AppResult<Option<Vec<u8>>> {
        self.fetch_marc(format!("/record/{}.marc", urlencoding::encode(bib_id)))
            .await
    }

    async fn lookup_barcode(&self, barcode: &str) -> AppResult<Option<Vec<u8>>> {
        self.fetch_marc(format!(
            "/record.marc?barcode={}",
            urlencoding::encode(barcode)
        ))
        .await
    }
}
