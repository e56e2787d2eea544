//! Interlibrary loan hand-off.
//!
//! The service can be called with a bib id, with OpenURL parameters, with an
//! explicit ILLiad form id, or with nothing at all; each shape maps to a
//! different ILLiad entry point.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::models::{BibRecord, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::illiad::{self, IlliadParams};
use crate::services::strategies::{check_permitted_affils, ServiceStrategy};
use crate::services::workflow::RequestParams;

/// Request-routing params that must not leak into the OpenURL.
const ROUTING_PARAMS: [&str; 3] = ["campus", "id", "commit"];

pub struct Ill {
    definition: ServiceDefinition,
    config: Arc<AppConfig>,
}

impl Ill {
    pub fn new(definition: ServiceDefinition, config: Arc<AppConfig>) -> Self {
        Self { definition, config }
    }

    /// OpenURL fields formed from a bib record.
    fn openurl_params_from_bib(&self, record: &BibRecord) -> IlliadParams {
        let mut params = illiad::paging_params(record);
        if let Some(issn) = record.issns.first() {
            params.insert("ISSN".to_string(), issn.clone());
        }
        params
    }
}

#[async_trait]
impl ServiceStrategy for Ill {
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
        // First, process the campus triage form: partner-college patrons
        // bounce away immediately.
        let campus = params.get("campus");
        if campus == Some("tc") {
            return Ok(Some(self.config.illiad.tc_ill_url.clone()));
        }

        // Medical-campus patrons use the ZCH ILLiad instance.
        let illiad_base_url = if campus == Some("MCC") {
            &self.config.illiad.base_url_zch
        } else {
            &self.config.illiad.base_url
        };
        let illiad_openurl_url = format!("{}/OpenURL", illiad_base_url);

        let mut illiad_params = match user {
            Some(user) => {
                illiad::default_params(&self.config.catalog_ui.base_url, user, record)
            }
            None => IlliadParams::new(),
        };

        // Afterwards the request params should only hold OpenURL values.
        let openurl_params: Vec<(String, String)> = params
            .iter()
            .filter(|(key, _)| !ROUTING_PARAMS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        // (1) Nothing at all: the ILLiad landing page.
        if record.is_none() && openurl_params.is_empty() {
            tracing::debug!("ill: redirect to ILLiad login page");
            return Ok(Some(self.config.illiad.login_url.clone()));
        }

        // (2) A bib record: send an OpenURL formed from its fields.
        if let Some(record) = record {
            illiad_params.extend(self.openurl_params_from_bib(record));
            illiad::clean_params(&mut illiad_params);
            return Ok(Some(illiad::build_full_url(
                &self.config.illiad,
                &illiad_openurl_url,
                &illiad_params,
            )));
        }

        let has_form = openurl_params.iter().any(|(key, _)| key == "Form");
        illiad_params.extend(openurl_params);

        // (3) An explicit ILLiad form id: Action=10 selects it.
        if has_form {
            illiad_params.insert("Action".to_string(), "10".to_string());
            illiad::clean_params(&mut illiad_params);
            return Ok(Some(illiad::build_full_url(
                &self.config.illiad,
                illiad_base_url,
                &illiad_params,
            )));
        }

        // (4) A raw OpenURL: pass it through and let ILLiad pick the form.
        illiad::clean_params(&mut illiad_params);
        Ok(Some(illiad::build_full_url(
            &self.config.illiad,
            &illiad_openurl_url,
            &illiad_params,
        )))
    }
}
