//! FOLIO (Okapi) client
//!
//! Item status, patron and instance lookups, and recall submission.  Every
//! call may fail independently; callers decide how a failure degrades.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::FolioConfig;
use crate::error::{AppError, AppResult};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FolioBackend: Send + Sync {
    /// The status name of a single item ("Available", "Checked out", ...).
    async fn item_status(&self, item_id: &str) -> AppResult<String>;

    /// Full item record, including its holdings record id.
    async fn item(&self, item_id: &str) -> AppResult<Value>;

    /// Patron record by university id.
    async fn user_by_uni(&self, uni: &str) -> AppResult<Value>;

    /// Instance record by human-readable id.
    async fn instance_by_hrid(&self, hrid: &str) -> AppResult<Value>;

    /// Circulation barcode for a patron, when one exists.
    async fn user_barcode(&self, uni: &str) -> AppResult<Option<String>>;

    /// Submit a recall request; returns the circulation response.
    async fn post_recall(&self, request: &Value) -> AppResult<Value>;
}

/// HTTP client against the Okapi gateway.
pub struct OkapiFolio {
    client: reqwest::Client,
    base_url: String,
    tenant: String,
    username: String,
    password: String,
    /// Okapi auth token, refreshed on demand.
    token: RwLock<Option<String>>,
}

impl OkapiFolio {
    pub fn new(config: &FolioConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Configuration(format!("folio client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tenant: config.tenant.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            token: RwLock::new(None),
        })
    }

    async fn token(&self) -> AppResult<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        let response = self
            .client
            .post(format!("{}/authn/login", self.base_url))
            .header("x-okapi-tenant", &self.tenant)
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Backend(format!(
                "FOLIO login failed with status {}",
                response.status()
            )));
        }
        let token = response
            .headers()
            .get("x-okapi-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AppError::Backend("FOLIO login returned no token".to_string()))?;
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn get_json(&self, path: &str) -> AppResult<Value> {
        let token = self.token().await?;
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("x-okapi-tenant", &self.tenant)
            .header("x-okapi-token", token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Backend(format!(
                "FOLIO GET {} returned status {}",
                path,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl FolioBackend for OkapiFolio {
    async fn item_status(&self, item_id: &str) -> AppResult<String> {
        let item = self.item(item_id).await?;
        item["status"]["name"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::Backend(format!("item {} has no status name", item_id)))
    }

    async fn item(&self, item_id: &str) -> AppResult<Value> {
        self.get_json(&format!("/item-storage/items/{}", item_id))
            .await
    }

    async fn user_by_uni(&self, uni: &str) -> AppResult<Value> {
        let query = urlencoding::encode_binary(format!("(username==\"{}\")", uni).as_bytes())
            .into_owned();
        let response = self.get_json(&format!("/users?query={}", query)).await?;
        response["users"]
            .as_array()
            .and_then(|users| users.first().cloned())
            .ok_or_else(|| AppError::NotFound(format!("No FOLIO user found for {}", uni)))
    }

    async fn instance_by_hrid(&self, hrid: &str) -> AppResult<Value> {
        let query =
            urlencoding::encode_binary(format!("(hrid=\"{}\")", hrid).as_bytes()).into_owned();
        let response = self
            .get_json(&format!("/search/instances?query={}&limit=1", query))
            .await?;
        response["instances"]
            .as_array()
            .and_then(|instances| instances.first().cloned())
            .ok_or_else(|| AppError::NotFound(format!("No FOLIO instance found for {}", hrid)))
    }

    async fn user_barcode(&self, uni: &str) -> AppResult<Option<String>> {
        let user = self.user_by_uni(uni).await?;
        Ok(user["barcode"].as_str().map(str::to_string))
    }

    async fn post_recall(&self, request: &Value) -> AppResult<Value> {
        let token = self.token().await?;
        let response = self
            .client
            .post(format!("{}/circulation/requests", self.base_url))
            .header("x-okapi-tenant", &self.tenant)
            .header("x-okapi-token", token)
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("FOLIO recall rejected: {} {}", status, body);
            return Err(AppError::Backend(format!(
                "Recall submission failed with status {}",
                status
            )));
        }
        Ok(response.json().await?)
    }
}
