//! Remote-storage retrieval services (BearStor, Barnard Remote, StarrStor).
//!
//! One location-filtered strategy serves every campus remote-storage
//! facility; the filter locations, labels and staff address come from each
//! service's configuration.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::{BibRecord, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::email::Mailer;
use crate::services::strategies::{holdings_by_location, ServiceStrategy};
use crate::services::workflow::RequestParams;

pub struct RemoteStorage {
    definition: ServiceDefinition,
    /// The facility name used in patron-facing messages ("BearStor").
    facility: String,
}

impl RemoteStorage {
    pub fn new(definition: ServiceDefinition) -> Self {
        let facility = definition
            .label
            .trim_end_matches(" Request")
            .trim_end_matches(" Requests")
            .to_string();
        Self {
            definition,
            facility,
        }
    }
}

#[async_trait]
impl ServiceStrategy for RemoteStorage {
    // Any authenticated patron may request from campus remote storage.

    async fn bib_eligible(
        &self,
        record: &BibRecord,
        resolver: &AvailabilityResolver,
    ) -> AppResult<()> {
        let storage_holdings = holdings_by_location(record, &self.definition.filter_locations());
        if storage_holdings.is_empty() {
            // Two distinct failures: wrong location vs nothing available.
            return Err(AppError::Ineligible(format!(
                "This record has no {} holdings. \
                 Only items stored in the {} remote storage facility may be \
                 requested via {} Requests.",
                self.facility, self.facility, self.facility
            )));
        }

        let available_items = resolver.available_items(record, &storage_holdings).await;
        if available_items.is_empty() {
            return Err(AppError::Ineligible(format!(
                "This record has no available {} items. \
                 All items for this record are either checked out or \
                 otherwise unavailable.",
                self.facility
            )));
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
        let Some(record) = record else {
            return Ok(json!({}));
        };
        let storage_holdings = holdings_by_location(record, &self.definition.filter_locations());
        let available_items = resolver.available_items(record, &storage_holdings).await;

        // With a single requestable item the form pre-selects its barcode.
        let filter_barcode = match available_items.as_slice() {
            [only] => Some(only.barcode.clone()),
            _ => None,
        };

        Ok(json!({
            "record": record,
            "holdings": storage_holdings,
            "filter_barcode": filter_barcode,
        }))
    }

    async fn send_emails(
        &self,
        mailer: &Mailer,
        params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        _submission: &Value,
    ) -> AppResult<()> {
        let (Some(staff_email), Some(record), Some(user)) =
            (self.definition.staff_email.as_deref(), record, user)
        else {
            return Ok(());
        };
        let barcodes = params.list("barcodes").join(", ");

        // Request to staff
        let staff_body = format!(
            "The following has been requested from {}:\n\n\
             Title:    {}\nRecord:   {}\nBarcodes: {}\n\n\
             Requested by {} <{}>",
            self.facility, record.title, record.id, barcodes, user.uni, user.email,
        );
        mailer
            .send(
                staff_email,
                &format!("New {} request", self.facility),
                &staff_body,
            )
            .await?;

        // Confirmation to the patron
        let confirm_body = format!(
            "You have requested the following from {}:\n\n\
             Title:    {}\nBarcodes: {}\n\n\
             You will be notified when the material is ready for pickup.",
            self.facility, record.title, barcodes,
        );
        mailer
            .send(
                &user.email,
                &format!("{} Request Confirmation", self.facility),
                &confirm_body,
            )
            .await
    }

    async fn confirmation_locals(
        &self,
        params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        _submission: &Value,
    ) -> AppResult<Value> {
        Ok(json!({
            "record": record,
            "barcodes": params.list("barcodes"),
            "patron_uni": user.map(|u| u.uni.clone()),
            "patron_email": user.map(|u| u.email.clone()),
            "staff_email": self.definition.staff_email,
        }))
    }
}
