//! Request service strategies
//!
//! Every service implements one trait; the workflow drives them through a
//! single lifecycle.  The registry maps strategy names to concrete
//! implementations at startup, so a misconfigured service fails the boot,
//! not a patron request.

pub mod borrow_direct;
pub mod campus_paging;
pub mod campus_scan;
pub mod elink;
pub mod fli_paging;
pub mod ill;
pub mod ill_scan;
pub mod in_process;
pub mod item_feedback;
pub mod notonshelf;
pub mod paging;
pub mod recall;
pub mod recap;
pub mod remote_storage;
pub mod special_collections;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::backends::Backends;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::bib::Holding;
use crate::models::{BibRecord, DispatchKind, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::email::Mailer;
use crate::services::workflow::RequestParams;

/// The capability set every service is polymorphic over.  Defaults make a
/// minimal pure-form service; concrete services override a subset.
#[async_trait]
pub trait ServiceStrategy: Send + Sync {
    /// May this patron use the service at all?
    async fn patron_eligible(&self, _user: &Patron) -> AppResult<()> {
        Ok(())
    }

    /// May this bib be requested through the service?
    async fn bib_eligible(
        &self,
        _record: &BibRecord,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<()> {
        Ok(())
    }

    /// Form or bounce.  Most services answer statically from configuration;
    /// a few decide per record.
    fn dispatch_kind(&self, configured: DispatchKind, _record: Option<&BibRecord>) -> DispatchKind {
        configured
    }

    /// Data bag handed to the form renderer.
    async fn form_locals(
        &self,
        _params: &RequestParams,
        record: Option<&BibRecord>,
        _user: Option<&Patron>,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Value> {
        Ok(json!({ "record": record }))
    }

    /// External URL for bounce services; None when one cannot be built.
    async fn service_url(
        &self,
        _params: &RequestParams,
        _record: Option<&BibRecord>,
        _user: Option<&Patron>,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Option<String>> {
        Ok(None)
    }

    /// Service-specific submission handling before notifications, e.g. a
    /// backend write.  The returned value feeds the confirmation page.
    async fn submit(
        &self,
        _params: &RequestParams,
        _record: Option<&BibRecord>,
        _user: Option<&Patron>,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Value> {
        Ok(json!({}))
    }

    /// Dispatch any staff/patron notifications for a submission.
    async fn send_emails(
        &self,
        _mailer: &Mailer,
        _params: &RequestParams,
        _record: Option<&BibRecord>,
        _user: Option<&Patron>,
        _submission: &Value,
    ) -> AppResult<()> {
        Ok(())
    }

    /// Data bag for the confirmation page shown after a submission.
    async fn confirmation_locals(
        &self,
        _params: &RequestParams,
        _record: Option<&BibRecord>,
        _user: Option<&Patron>,
        _submission: &Value,
    ) -> AppResult<Value> {
        Ok(json!({}))
    }
}

/// Pure-form service on trait defaults, with an optional staff notification.
/// Services without dedicated logic (precataloging requests, Avery onsite)
/// run on this.
pub struct DefaultService {
    definition: ServiceDefinition,
}

impl DefaultService {
    pub fn new(definition: ServiceDefinition) -> Self {
        Self { definition }
    }
}

#[async_trait]
impl ServiceStrategy for DefaultService {
    async fn send_emails(
        &self,
        mailer: &Mailer,
        params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        _submission: &Value,
    ) -> AppResult<()> {
        let Some(staff_email) = self.definition.staff_email.as_deref() else {
            return Ok(());
        };
        let subject = format!("New {}", self.definition.label);
        let body = request_email_body(&self.definition.label, params, record, user);
        mailer.send(staff_email, &subject, &body).await
    }

    async fn confirmation_locals(
        &self,
        _params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        _submission: &Value,
    ) -> AppResult<Value> {
        Ok(json!({
            "record": record,
            "patron_uni": user.map(|u| u.uni.clone()),
            "patron_email": user.map(|u| u.email.clone()),
        }))
    }
}

// COMMON LOGIC
// Generic helpers called by different service strategies.

/// The holdings of a record at any of the given location codes.
pub(crate) fn holdings_by_location<'a>(
    record: &'a BibRecord,
    location_codes: &[&str],
) -> Vec<&'a Holding> {
    if location_codes.is_empty() {
        return Vec::new();
    }
    record
        .holdings
        .iter()
        .filter(|holding| location_codes.contains(&holding.location_code.as_str()))
        .collect()
}

/// Affiliation gate shared by every permitted-affiliation service: the
/// patron's affiliation set must intersect the permitted list.
pub(crate) fn check_permitted_affils(
    definition: &ServiceDefinition,
    user: &Patron,
) -> AppResult<()> {
    if user.affils_permit(&definition.permitted_affils, &definition.denied_affils) {
        return Ok(());
    }
    Err(AppError::Ineligible(format!(
        "Your account is not eligible for the {} service.",
        definition.label
    )))
}

/// Standard body for staff request notifications.
pub(crate) fn request_email_body(
    label: &str,
    params: &RequestParams,
    record: Option<&BibRecord>,
    user: Option<&Patron>,
) -> String {
    let mut lines = vec![format!("The following has been requested via {}:", label), String::new()];
    if let Some(record) = record {
        lines.push(format!("Title:  {}", record.title));
        lines.push(format!("Author: {}", record.author));
        lines.push(format!("Record: {}", record.id));
    }
    let barcodes = params.list("barcodes");
    if !barcodes.is_empty() {
        lines.push(format!("Barcodes: {}", barcodes.join(", ")));
    }
    if let Some(note) = params.get("note") {
        lines.push(format!("Note: {}", note));
    }
    if let Some(user) = user {
        lines.push(String::new());
        lines.push(format!("Requested by {} <{}>", user.uni, user.email));
    }
    lines.join("\n")
}

/// Build the strategy instance a definition names.  Unknown names are a
/// configuration error surfaced at startup.
pub fn build_strategy(
    definition: &ServiceDefinition,
    config: &Arc<AppConfig>,
    backends: &Backends,
) -> AppResult<Arc<dyn ServiceStrategy>> {
    let def = definition.clone();
    let strategy: Arc<dyn ServiceStrategy> = match definition.strategy_name() {
        "default" | "precat" | "avery_onsite" => Arc::new(DefaultService::new(def)),
        "paging" => Arc::new(paging::Paging::new(def)),
        "campus_paging" => Arc::new(campus_paging::CampusPaging::new(def, config.clone(), false)),
        "campus_paging_pilot" => {
            Arc::new(campus_paging::CampusPaging::new(def, config.clone(), true))
        }
        "fli_paging" => Arc::new(fli_paging::FliPaging::new(def, config.clone())),
        "campus_scan" => Arc::new(campus_scan::CampusScan::new(def, config.clone())),
        "ill" => Arc::new(ill::Ill::new(def, config.clone())),
        "ill_scan" => Arc::new(ill_scan::IllScan::new(def, config.clone())),
        "borrow_direct" => Arc::new(borrow_direct::BorrowDirect::new(def, config.clone())),
        "elink" => Arc::new(elink::Elink::new(def)),
        "in_process" => Arc::new(in_process::InProcess::new(def)),
        "item_feedback" => Arc::new(item_feedback::ItemFeedback::new(def)),
        "notonshelf" => Arc::new(notonshelf::NotOnShelf::new(def)),
        "remote_storage" => Arc::new(remote_storage::RemoteStorage::new(def)),
        "recall" => Arc::new(recall::Recall::new(def, config.clone(), backends.folio.clone())),
        "special_collections" => {
            Arc::new(special_collections::SpecialCollections::new(def, config.clone()))
        }
        "recap_loan" => Arc::new(recap::RecapRequest::new(
            def,
            config.clone(),
            backends.scsb.clone(),
            recap::RequestMode::Retrieval,
        )),
        "recap_scan" => Arc::new(recap::RecapRequest::new(
            def,
            config.clone(),
            backends.scsb.clone(),
            recap::RequestMode::Edd,
        )),
        other => {
            return Err(AppError::Configuration(format!(
                "No strategy implementation registered for service {}",
                other
            )))
        }
    };
    Ok(strategy)
}
