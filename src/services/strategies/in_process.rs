//! In-process requests: material that is On Order or In Process.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

use crate::error::{AppError, AppResult};
use crate::models::bib::Holding;
use crate::models::{BibRecord, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::email::Mailer;
use crate::services::strategies::{request_email_body, ServiceStrategy};
use crate::services::workflow::RequestParams;

static IN_PROCESS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)process|order").expect("valid regex"));

pub struct InProcess {
    definition: ServiceDefinition,
}

impl InProcess {
    pub fn new(definition: ServiceDefinition) -> Self {
        Self { definition }
    }

    /// Which holdings of this bib are In Process or On Order?
    /// Sometimes flagged in the call number, sometimes in acquisitions info.
    fn in_process_holdings<'a>(record: &'a BibRecord) -> Vec<&'a Holding> {
        record
            .holdings
            .iter()
            .filter(|holding| {
                let call_number = holding.display_call_number.as_deref().unwrap_or("");
                let acq_info = holding.acquisitions_information.join(" ");
                IN_PROCESS_MARKER.is_match(call_number) || IN_PROCESS_MARKER.is_match(&acq_info)
            })
            .collect()
    }
}

#[async_trait]
impl ServiceStrategy for InProcess {
    async fn bib_eligible(
        &self,
        record: &BibRecord,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<()> {
        if Self::in_process_holdings(record).is_empty() {
            return Err(AppError::Ineligible(
                "This item has no holdings On Order or In Process. \
                 Please ask a librarian or ask for assistance at a service desk."
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
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Value> {
        Ok(json!({
            "record": record,
            "holdings": record.map(Self::in_process_holdings),
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
        let Some(staff_email) = self.definition.staff_email.as_deref() else {
            return Ok(());
        };
        let subject = format!("New {}", self.definition.label);
        let body = request_email_body(&self.definition.label, params, record, user);
        mailer.send(staff_email, &subject, &body).await?;
        // Patrons get the same details as their confirmation copy.
        if let Some(user) = user {
            mailer
                .send(&user.email, &format!("{} Confirmation", self.definition.label), &body)
                .await?;
        }
        Ok(())
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
            "note": params.get("note"),
            "patron_uni": user.map(|u| u.uni.clone()),
            "patron_email": user.map(|u| u.email.clone()),
            "staff_email": self.definition.staff_email,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holdings_flagged_by_call_number_or_acquisitions_info() {
        let record = BibRecord {
            holdings: vec![
                Holding {
                    mfhd_id: "h1".into(),
                    display_call_number: Some("In Process".into()),
                    ..Default::default()
                },
                Holding {
                    mfhd_id: "h2".into(),
                    display_call_number: Some("QA1 .A6".into()),
                    acquisitions_information: vec!["On order as of June".into()],
                    ..Default::default()
                },
                Holding {
                    mfhd_id: "h3".into(),
                    display_call_number: Some("QA2 .B7".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let flagged = InProcess::in_process_holdings(&record);
        let ids: Vec<_> = flagged.iter().map(|h| h.mfhd_id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "h2"]);
    }
}
