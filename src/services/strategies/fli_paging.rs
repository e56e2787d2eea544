//! FLI Partnership paging.
//!
//! Like campus paging, but only valid for FLI holdings and only for the
//! configured partner affiliation.

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::{BibRecord, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::illiad;
use crate::services::strategies::{check_permitted_affils, holdings_by_location, ServiceStrategy};
use crate::services::workflow::RequestParams;
use std::sync::Arc;

pub struct FliPaging {
    definition: ServiceDefinition,
    config: Arc<AppConfig>,
}

impl FliPaging {
    pub fn new(definition: ServiceDefinition, config: Arc<AppConfig>) -> Self {
        Self { definition, config }
    }
}

#[async_trait]
impl ServiceStrategy for FliPaging {
    async fn patron_eligible(&self, user: &Patron) -> AppResult<()> {
        check_permitted_affils(&self.definition, user)
    }

    async fn bib_eligible(
        &self,
        record: &BibRecord,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<()> {
        let fli_holdings = holdings_by_location(record, &self.definition.filter_locations());
        if fli_holdings.is_empty() {
            return Err(AppError::Ineligible(
                "This record has no FLI Partnership holdings. \
                 This service is for the request of FLI Partnership materials only."
                    .to_string(),
            ));
        }
        Ok(())
    }

    async fn service_url(
        &self,
        _params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Option<String>> {
        let (Some(record), Some(user)) = (record, user) else {
            return Ok(None);
        };

        // Explicitly select the form, and explicitly set form field values
        let mut illiad_params =
            illiad::default_params(&self.config.catalog_ui.base_url, user, Some(record));
        illiad_params.insert("Action".to_string(), "10".to_string());
        illiad_params.insert("Form".to_string(), "20".to_string());
        illiad_params.insert("Value".to_string(), "GenericRequestPDD".to_string());
        illiad_params.insert("CitedIn".to_string(), "OPAC-PAGING".to_string());
        illiad_params.extend(illiad::paging_params(record));
        illiad::clean_params(&mut illiad_params);

        Ok(Some(illiad::build_full_url(
            &self.config.illiad,
            &self.config.illiad.base_url,
            &illiad_params,
        )))
    }
}
