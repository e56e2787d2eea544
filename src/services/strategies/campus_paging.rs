//! Campus paging: bounce to the ILLiad paging form through EZproxy.
//!
//! The pilot variant prefills the form without the shared default fields and
//! asks ILLiad for the form explicitly.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::models::{BibRecord, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::illiad::{self, IlliadParams};
use crate::services::strategies::{check_permitted_affils, ServiceStrategy};
use crate::services::workflow::RequestParams;

pub struct CampusPaging {
    definition: ServiceDefinition,
    config: Arc<AppConfig>,
    pilot: bool,
}

impl CampusPaging {
    pub fn new(definition: ServiceDefinition, config: Arc<AppConfig>, pilot: bool) -> Self {
        Self {
            definition,
            config,
            pilot,
        }
    }

    fn illiad_params(&self, record: &BibRecord, user: &Patron) -> IlliadParams {
        let mut params = if self.pilot {
            // The pilot prefills everything itself and selects the form
            // explicitly (Action=10).
            let mut params = IlliadParams::new();
            params.insert("Action".to_string(), "10".to_string());
            params.extend(illiad::paging_params(record));
            params.insert(
                "ItemInfo2".to_string(),
                user.barcode.clone().unwrap_or_default(),
            );
            params.insert("ItemInfo4".to_string(), user.patron_groups().join(","));
            params
        } else {
            let mut params =
                illiad::default_params(&self.config.catalog_ui.base_url, user, Some(record));
            params.extend(illiad::paging_params(record));
            params
        };

        params.insert("Form".to_string(), "20".to_string());
        params.insert("Value".to_string(), "GenericRequestPDD".to_string());
        // Routing tag so staff know the origin of the request
        params.insert("CitedIn".to_string(), "OPAC-PAGING".to_string());
        illiad::clean_params(&mut params);
        params
    }
}

#[async_trait]
impl ServiceStrategy for CampusPaging {
    async fn patron_eligible(&self, user: &Patron) -> AppResult<()> {
        check_permitted_affils(&self.definition, user)
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
        let illiad_params = self.illiad_params(record, user);
        Ok(Some(illiad::build_full_url(
            &self.config.illiad,
            &self.config.illiad.base_url,
            &illiad_params,
        )))
    }
}
