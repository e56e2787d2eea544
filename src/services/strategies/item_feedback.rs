//! Item feedback: patrons flag offsite-transfer candidates for staff review.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::{BibRecord, Institution, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::email::Mailer;
use crate::services::strategies::ServiceStrategy;
use crate::services::workflow::RequestParams;

/// The fixed feedback options shown on the form.
const FEEDBACK_OPTIONS: [(&str, &str); 4] = [
    ("retain", "retained on campus and not sent to offsite storage"),
    ("rare", "treated as a rare or unique item (non-circulating)"),
    ("review", "reviewed for preservation (item in poor condition)"),
    ("other", "other (provide details below)"),
];

pub struct ItemFeedback {
    definition: ServiceDefinition,
}

impl ItemFeedback {
    pub fn new(definition: ServiceDefinition) -> Self {
        Self { definition }
    }

    fn feedback_text(code: &str) -> Option<&'static str> {
        FEEDBACK_OPTIONS
            .iter()
            .find(|(key, _)| *key == code)
            .map(|(_, text)| *text)
    }

    /// The same set of fields feeds both the emails and the confirm page.
    fn feedback_locals(
        &self,
        params: &RequestParams,
        record: &BibRecord,
        user: Option<&Patron>,
    ) -> Value {
        // The mfhd_id param identifies which holding the patron is asking
        // about; its location details travel with the feedback.
        let holding = params.get("mfhd_id").and_then(|id| record.holding(id));
        json!({
            "record": record,
            "location_name": holding.map(|h| h.location_display.clone()),
            "location_code": holding.map(|h| h.location_code.clone()),
            "feedback_text": params.get("feedback").and_then(Self::feedback_text),
            "note": params.get("note"),
            "patron_email": user.map(|u| u.email.clone()),
            "staff_email": self.definition.staff_email,
        })
    }
}

#[async_trait]
impl ServiceStrategy for ItemFeedback {
    async fn bib_eligible(
        &self,
        record: &BibRecord,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<()> {
        // Feedback only applies to locally-owned, locally-cataloged material.
        if record.institution != Institution::Cul {
            return Err(AppError::Ineligible(
                "This item is not owned by the Libraries. \
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
        let feedback_options: Vec<Value> = FEEDBACK_OPTIONS
            .iter()
            .map(|(key, text)| json!({ "value": key, "text": text }))
            .collect();
        Ok(json!({
            "record": record,
            "feedback_options": feedback_options,
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
        let (Some(staff_email), Some(record)) =
            (self.definition.staff_email.as_deref(), record)
        else {
            return Ok(());
        };
        let locals = self.feedback_locals(params, record, user);
        let body = format!(
            "Feedback on {} ({}):\n\nThis item should be {}\n\nNote: {}\n\nFrom: {}",
            record.title,
            record.id,
            locals["feedback_text"].as_str().unwrap_or("(unspecified)"),
            locals["note"].as_str().unwrap_or(""),
            user.map(|u| u.email.as_str()).unwrap_or(""),
        );
        mailer
            .send(staff_email, &format!("New {}", self.definition.label), &body)
            .await
    }

    async fn confirmation_locals(
        &self,
        params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        _submission: &Value,
    ) -> AppResult<Value> {
        match record {
            Some(record) => Ok(self.feedback_locals(params, record, user)),
            None => Ok(json!({})),
        }
    }
}
