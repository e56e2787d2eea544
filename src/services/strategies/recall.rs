//! Recall: ask the circulation system to call a checked-out item back.
//!
//! Eligibility requires an item whose status is exactly "Checked out" -
//! merely unavailable items cannot be recalled.  Submission is a circulation
//! write built from three separate FOLIO lookups; any one failing aborts the
//! request with its message shown to the patron.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::backends::FolioBackend;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::availability::ItemStatus;
use crate::models::{BibRecord, Institution, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::strategies::ServiceStrategy;
use crate::services::workflow::RequestParams;

pub struct Recall {
    definition: ServiceDefinition,
    config: Arc<AppConfig>,
    folio: Arc<dyn FolioBackend>,
}

impl Recall {
    pub fn new(
        definition: ServiceDefinition,
        config: Arc<AppConfig>,
        folio: Arc<dyn FolioBackend>,
    ) -> Self {
        Self {
            definition,
            config,
            folio,
        }
    }
}

#[async_trait]
impl ServiceStrategy for Recall {
    async fn bib_eligible(
        &self,
        record: &BibRecord,
        resolver: &AvailabilityResolver,
    ) -> AppResult<()> {
        // Only locally-held material can be recalled.
        if record.institution != Institution::Cul {
            return Err(AppError::Ineligible(
                "Recall requests can only be made for locally-held library items.".to_string(),
            ));
        }

        let statuses = resolver.folio_availability(record).await;
        let checked_out_count = statuses.count_of(&ItemStatus::CheckedOut);
        if checked_out_count == 0 {
            return Err(AppError::Ineligible(
                "This record has no checked-out items. \
                 Recall requests can only be made against checked-out items."
                    .to_string(),
            ));
        }

        Ok(())
    }

    async fn form_locals(
        &self,
        _params: &RequestParams,
        record: Option<&BibRecord>,
        _user: Option<&Patron>,
        resolver: &AvailabilityResolver,
    ) -> AppResult<Value> {
        let availability = match record {
            Some(record) => Some(resolver.folio_availability(record).await.clone()),
            None => None,
        };
        Ok(json!({
            "record": record,
            "availability": availability,
        }))
    }

    /// Place the recall.  The circulation system needs the requester, the
    /// instance, and the item's holdings record; each comes from its own
    /// lookup and any failure aborts the submission.
    async fn submit(
        &self,
        params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Value> {
        let record = record
            .ok_or_else(|| AppError::Ineligible("No record supplied for recall".to_string()))?;
        let user = user
            .ok_or_else(|| AppError::Ineligible("Recall requests require sign-in".to_string()))?;

        let folio_user = self.folio.user_by_uni(&user.uni).await?;
        let requester_id = required_id(&folio_user, "id", "user")?;

        let instance = self.folio.instance_by_hrid(&record.id).await?;
        let instance_id = required_id(&instance, "id", "instance")?;

        let item_id = params
            .get("item_id")
            .ok_or_else(|| AppError::Ineligible("Please select an item to recall.".to_string()))?;
        Uuid::parse_str(item_id)
            .map_err(|_| AppError::Ineligible(format!("{} is not a valid item id", item_id)))?;
        let item = self.folio.item(item_id).await?;
        let holdings_id = required_id(&item, "holdingsRecordId", "item")?;

        let recall_request = json!({
            "requestLevel": "Item",
            "requestType": "Recall",

            "instanceId": instance_id,
            "holdingsRecordId": holdings_id,
            "itemId": item_id,

            "requesterId": requester_id,

            "fulfillmentPreference": "Hold Shelf",
            "pickupServicePointId": self.config.folio.pickup_service_point_id,

            "requestDate": Utc::now().format("%Y-%m-%d").to_string(),
        });

        self.folio.post_recall(&recall_request).await
    }

    /// The confirmation page echoes the circulation response back to the
    /// patron, with a link to their borrowing account.
    async fn confirmation_locals(
        &self,
        _params: &RequestParams,
        _record: Option<&BibRecord>,
        _user: Option<&Patron>,
        submission: &Value,
    ) -> AppResult<Value> {
        Ok(json!({
            "service": self.definition.label,
            "title": submission["instance"]["title"],
            "call_number": submission["item"]["callNumber"],
            "barcode": submission["item"]["barcode"],
            "pickup": submission["pickupServicePoint"]["discoveryDisplayName"],
            "status": submission["status"],
            "my_borrowing_account_url":
                format!("{}/my_account", self.config.catalog_ui.base_url),
        }))
    }
}

/// Pull a required id field out of a backend response.
fn required_id(value: &Value, field: &str, what: &str) -> AppResult<String> {
    value[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AppError::Backend(format!("FOLIO {} record has no {}", what, field)))
}
