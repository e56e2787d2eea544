//! Campus scan: bounce to the ILLiad scan forms.
//!
//! Serial records (any ISSN) become article requests; everything else becomes
//! a book-chapter request.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::models::{BibRecord, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::illiad::{self, IlliadParams};
use crate::services::strategies::{check_permitted_affils, ServiceStrategy};
use crate::services::workflow::RequestParams;

pub struct CampusScan {
    definition: ServiceDefinition,
    config: Arc<AppConfig>,
}

impl CampusScan {
    pub fn new(definition: ServiceDefinition, config: Arc<AppConfig>) -> Self {
        Self { definition, config }
    }

    /// Gather all of the params to pre-fill into the ILLiad form, with the
    /// Action and Form chosen here rather than by ILLiad.
    fn illiad_params(&self, record: &BibRecord, user: &Patron) -> IlliadParams {
        let mut params =
            illiad::default_params(&self.config.catalog_ui.base_url, user, Some(record));
        params.insert("Action".to_string(), "10".to_string());
        // Routing tag so staff know the origin of the request
        params.insert("CitedIn".to_string(), "OPAC-DOCDEL".to_string());

        if !record.issns.is_empty() {
            // An ISSN means an article request
            params.insert("Form".to_string(), "22".to_string());
            params.extend(illiad::article_params(record));
        } else {
            // Otherwise, a book-chapter request
            params.insert("Form".to_string(), "23".to_string());
            params.extend(illiad::book_chapter_params(record));
        }

        illiad::clean_params(&mut params);
        params
    }
}

#[async_trait]
impl ServiceStrategy for CampusScan {
    async fn patron_eligible(&self, user: &Patron) -> AppResult<()> {
        check_permitted_affils(&self.definition, user)
    }

    async fn service_url(
        &self,
        params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Option<String>> {
        // Campus triage comes first: partner-college patrons go to their own
        // library's services page.
        if params.get("campus") == Some("tc") {
            return Ok(Some(self.config.illiad.tc_services_url.clone()));
        }

        let (Some(record), Some(user)) = (record, user) else {
            return Ok(None);
        };
        let illiad_params = self.illiad_params(record, user);
        Ok(Some(illiad::build_full_url(
            &self.config.illiad,
            &self.config.illiad.base_url,
            &illiad_params,
        )))
    }
}
