//! SCSB/ReCAP shared-collection client
//!
//! Availability is fetched per bib or per barcode list; retrieval requests
//! are submitted through the same gateway.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::ScsbConfig;
use crate::error::{AppError, AppResult};

/// One row of an SCSB availability response.
#[derive(Debug, Clone, Deserialize)]
pub struct BarcodeStatus {
    #[serde(rename = "itemBarcode")]
    pub barcode: String,
    #[serde(rename = "itemAvailabilityStatus")]
    pub status: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScsbBackend: Send + Sync {
    /// Availability of every item of a bib, keyed by barcode.
    async fn bib_availability(
        &self,
        bib_id: &str,
        institution: &str,
    ) -> AppResult<Vec<BarcodeStatus>>;

    /// Availability for an explicit barcode list.
    async fn item_availability(&self, barcodes: &[String]) -> AppResult<Vec<BarcodeStatus>>;

    /// Submit a retrieval/EDD request.
    async fn request_item(&self, payload: &Value) -> AppResult<Value>;
}

/// HTTP client against the SCSB REST gateway.
pub struct ScsbRest {
    client: reqwest::Client,
    config: ScsbConfig,
}

impl ScsbRest {
    pub fn new(config: &ScsbConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Configuration(format!("scsb client: {}", e)))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn post(&self, path: &str, payload: &Value) -> AppResult<Value> {
        let url = format!("{}{}", self.config.url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("api_key", &self.config.api_key)
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("SCSB {} returned status {}: {}", path, status, body);
            return Err(AppError::Backend(format!(
                "SCSB returned status {}",
                status
            )));
        }
        Ok(response.json().await?)
    }

    fn parse_statuses(response: Value) -> AppResult<Vec<BarcodeStatus>> {
        let rows: Vec<BarcodeStatus> = serde_json::from_value(response)
            .map_err(|e| AppError::Backend(format!("unexpected SCSB response shape: {}", e)))?;
        Ok(rows
            .into_iter()
            .filter(|row| {
                if let Some(message) = &row.error_message {
                    tracing::error!("SCSB availability error: {}", message);
                    return false;
                }
                true
            })
            .collect())
    }
}

#[async_trait]
impl ScsbBackend for ScsbRest {
    async fn bib_availability(
        &self,
        bib_id: &str,
        institution: &str,
    ) -> AppResult<Vec<BarcodeStatus>> {
        tracing::debug!("scsb bib_availability({}, {})", bib_id, institution);
        let payload = serde_json::json!({
            "bibliographicId": bib_id,
            "institutionId": institution,
        });
        let path = self.config.bib_availability_path.clone();
        let response = self.post(&path, &payload).await?;
        Self::parse_statuses(response)
    }

    async fn item_availability(&self, barcodes: &[String]) -> AppResult<Vec<BarcodeStatus>> {
        let payload = serde_json::json!({ "barcodes": barcodes });
        let path = self.config.item_availability_path.clone();
        let response = self.post(&path, &payload).await?;
        Self::parse_statuses(response)
    }

    async fn request_item(&self, payload: &Value) -> AppResult<Value> {
        let path = self.config.request_item_path.clone();
        self.post(&path, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_rows_are_dropped() {
        let response = serde_json::json!([
            {"itemBarcode": "CU0001", "itemAvailabilityStatus": "Available", "errorMessage": null},
            {"itemBarcode": "", "itemAvailabilityStatus": null,
             "errorMessage": "Bib Id doesn't exist in SCSB database."},
        ]);
        let rows = ScsbRest::parse_statuses(response).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].barcode, "CU0001");
        assert_eq!(rows[0].status.as_deref(), Some("Available"));
    }
}
