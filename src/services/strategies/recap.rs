//! Offsite (ReCAP) retrieval and scan requests.
//!
//! Both services act on a specific offsite holding; delivery requests move
//! physical items, scan requests produce electronic document delivery.
//! Submissions go to the shared-collection request gateway.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::backends::ScsbBackend;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::bib::Holding;
use crate::models::{BibRecord, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::email::Mailer;
use crate::services::strategies::ServiceStrategy;
use crate::services::workflow::RequestParams;

/// What the patron is asking the repository to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Retrieval,
    Edd,
}

impl RequestMode {
    fn request_type(&self) -> &'static str {
        match self {
            RequestMode::Retrieval => "RETRIEVAL",
            RequestMode::Edd => "EDD",
        }
    }
}

pub struct RecapRequest {
    definition: ServiceDefinition,
    config: Arc<AppConfig>,
    scsb: Arc<dyn ScsbBackend>,
    mode: RequestMode,
}

impl RecapRequest {
    pub fn new(
        definition: ServiceDefinition,
        config: Arc<AppConfig>,
        scsb: Arc<dyn ScsbBackend>,
        mode: RequestMode,
    ) -> Self {
        Self {
            definition,
            config,
            scsb,
            mode,
        }
    }

    /// The offsite holding this request acts upon: the mfhd_id param when
    /// present, else the only offsite holding.
    fn selected_holding<'a>(
        &self,
        params: &RequestParams,
        record: &'a BibRecord,
    ) -> Option<&'a Holding> {
        let offsite = record.offsite_holdings();
        match params.get("mfhd_id") {
            Some(mfhd_id) => offsite.into_iter().find(|h| h.mfhd_id == mfhd_id),
            None if offsite.len() == 1 => offsite.into_iter().next(),
            None => None,
        }
    }
}

#[async_trait]
impl ServiceStrategy for RecapRequest {
    async fn patron_eligible(&self, user: &Patron) -> AppResult<()> {
        let offsite = &self.config.offsite;
        if !user.affils_permit(&offsite.permitted_affils, &offsite.denied_affils) {
            return Err(AppError::Ineligible(
                "Your account is not eligible for offsite requests.".to_string(),
            ));
        }
        if self.mode == RequestMode::Edd && !user.edd_eligible() {
            return Err(AppError::Ineligible(
                "Your account is not eligible for electronic delivery of offsite material."
                    .to_string(),
            ));
        }
        Ok(())
    }

    async fn bib_eligible(
        &self,
        record: &BibRecord,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<()> {
        if record.offsite_holdings().is_empty() {
            return Err(AppError::Ineligible(format!(
                "The requested record (bib id {}) has no offsite holdings available.",
                record.id
            )));
        }
        Ok(())
    }

    async fn form_locals(
        &self,
        params: &RequestParams,
        record: Option<&BibRecord>,
        _user: Option<&Patron>,
        resolver: &AvailabilityResolver,
    ) -> AppResult<Value> {
        let Some(record) = record else {
            return Ok(json!({}));
        };
        let holding = self.selected_holding(params, record);
        let availability = resolver.resolve(record).await;
        Ok(json!({
            "record": record,
            "offsite_holdings": record.offsite_holdings(),
            "holding": holding,
            "availability": availability,
            "edd": self.mode == RequestMode::Edd,
        }))
    }

    /// Post the request to the shared-collection gateway.  The gateway's
    /// screen message is surfaced verbatim on failure.
    async fn submit(
        &self,
        params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Value> {
        let record = record
            .ok_or_else(|| AppError::Ineligible("No record supplied for request".to_string()))?;
        let user = user.ok_or_else(|| {
            AppError::Ineligible("Offsite requests require sign-in".to_string())
        })?;
        let patron_barcode = user.barcode.clone().ok_or_else(|| {
            AppError::Ineligible(
                "Cannot determine your patron barcode; please contact the library.".to_string(),
            )
        })?;

        let barcodes = params.list("barcodes");
        if barcodes.is_empty() {
            return Err(AppError::Ineligible(
                "Please select at least one item to request.".to_string(),
            ));
        }
        let holding = self.selected_holding(params, record).ok_or_else(|| {
            AppError::Ineligible("Cannot find the requested offsite holding.".to_string())
        })?;

        let mut payload = json!({
            "requestType": self.mode.request_type(),
            "requestingInstitution": "CUL",
            "itemOwningInstitution": record.institution.as_str(),
            "patronBarcode": patron_barcode,
            "emailAddress": user.email,
            "itemBarcodes": barcodes,
            "titleIdentifier": record.title_identifier(),
        });
        if let Some(customer_code) = &holding.customer_code {
            payload["deliveryLocation"] = json!(customer_code);
        }
        match self.mode {
            RequestMode::Retrieval => {
                if let Some(delivery) = params.get("delivery_location") {
                    payload["deliveryLocation"] = json!(delivery);
                }
            }
            RequestMode::Edd => {
                payload["chapterTitle"] = json!(params.get("chapter_title").unwrap_or(""));
                payload["startPage"] = json!(params.get("start_page").unwrap_or(""));
                payload["endPage"] = json!(params.get("end_page").unwrap_or(""));
            }
        }

        let response = self.scsb.request_item(&payload).await?;
        if response["success"].as_bool() == Some(false) {
            let message = response["screenMessage"]
                .as_str()
                .unwrap_or("The offsite request was not accepted.")
                .to_string();
            return Err(AppError::Ineligible(message));
        }
        Ok(response)
    }

    async fn send_emails(
        &self,
        mailer: &Mailer,
        params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        _submission: &Value,
    ) -> AppResult<()> {
        let (Some(record), Some(user)) = (record, user) else {
            return Ok(());
        };
        let body = format!(
            "You have requested the following from offsite storage:\n\n\
             Title:    {}\nBarcodes: {}\n\n\
             You will be notified when your request is ready.",
            record.title,
            params.list("barcodes").join(", "),
        );
        mailer
            .send(
                &user.email,
                &format!("{} Confirmation", self.definition.label),
                &body,
            )
            .await
    }

    async fn confirmation_locals(
        &self,
        params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        submission: &Value,
    ) -> AppResult<Value> {
        Ok(json!({
            "record": record,
            "barcodes": params.list("barcodes"),
            "screen_message": submission["screenMessage"],
            "patron_email": user.map(|u| u.email.clone()),
        }))
    }
}
