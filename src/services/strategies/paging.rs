//! Generic paging service: a form posted to circulation staff.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::models::{BibRecord, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::email::Mailer;
use crate::services::strategies::{request_email_body, ServiceStrategy};
use crate::services::workflow::RequestParams;

pub struct Paging {
    definition: ServiceDefinition,
}

impl Paging {
    pub fn new(definition: ServiceDefinition) -> Self {
        Self { definition }
    }
}

#[async_trait]
impl ServiceStrategy for Paging {
    async fn form_locals(
        &self,
        _params: &RequestParams,
        record: Option<&BibRecord>,
        _user: Option<&Patron>,
        resolver: &AvailabilityResolver,
    ) -> AppResult<Value> {
        let availability = match record {
            Some(record) => Some(resolver.resolve(record).await),
            None => None,
        };
        Ok(json!({
            "record": record,
            "availability": availability,
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
        mailer.send(staff_email, &subject, &body).await
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
        }))
    }
}
