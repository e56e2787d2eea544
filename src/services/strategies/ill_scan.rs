//! ILL scan: bounce to the ILLiad scan forms, with campus triage.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::models::{BibRecord, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::illiad::{self, IlliadParams};
use crate::services::strategies::{check_permitted_affils, ServiceStrategy};
use crate::services::workflow::RequestParams;

pub struct IllScan {
    definition: ServiceDefinition,
    config: Arc<AppConfig>,
}

impl IllScan {
    pub fn new(definition: ServiceDefinition, config: Arc<AppConfig>) -> Self {
        Self { definition, config }
    }

    fn illiad_params(&self, record: &BibRecord, user: &Patron) -> IlliadParams {
        let mut params =
            illiad::default_params(&self.config.catalog_ui.base_url, user, Some(record));
        params.insert("Action".to_string(), "10".to_string());
        params.insert("CitedIn".to_string(), "OPAC-ILL".to_string());

        if !record.issns.is_empty() {
            params.insert("Form".to_string(), "22".to_string());
            params.extend(illiad::article_params(record));
        } else {
            params.insert("Form".to_string(), "23".to_string());
            params.extend(illiad::book_chapter_params(record));
        }

        illiad::clean_params(&mut params);
        params
    }
}

#[async_trait]
impl ServiceStrategy for IllScan {
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
        // Campus triage first.
        let campus = params.get("campus");
        if campus == Some("tc") {
            return Ok(Some(self.config.illiad.tc_ill_url.clone()));
        }
        let illiad_base_url = if campus == Some("MCC") {
            &self.config.illiad.base_url_zch
        } else {
            &self.config.illiad.base_url
        };

        let (Some(record), Some(user)) = (record, user) else {
            return Ok(None);
        };
        let illiad_params = self.illiad_params(record, user);
        Ok(Some(illiad::build_full_url(
            &self.config.illiad,
            illiad_base_url,
            &illiad_params,
        )))
    }
}
