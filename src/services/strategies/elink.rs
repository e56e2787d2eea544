//! E-Link: authenticated pass-through redirect to a vendor OpenURL endpoint.

use async_trait::async_trait;

use crate::error::{AppError, AppResult};
use crate::models::{BibRecord, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::strategies::ServiceStrategy;
use crate::services::workflow::RequestParams;

pub struct Elink {
    definition: ServiceDefinition,
}

impl Elink {
    pub fn new(definition: ServiceDefinition) -> Self {
        Self { definition }
    }
}

#[async_trait]
impl ServiceStrategy for Elink {
    async fn service_url(
        &self,
        params: &RequestParams,
        _record: Option<&BibRecord>,
        _user: Option<&Patron>,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Option<String>> {
        let vendor_endpoint = self.definition.vendor_endpoint.as_deref().ok_or_else(|| {
            AppError::Configuration(format!(
                "No vendor endpoint configured for service {}",
                self.definition.key
            ))
        })?;
        tracing::debug!("elink vendor_endpoint={}", vendor_endpoint);

        // Pass through everything that was handed to us (the OpenURL).
        let query = params.to_query();
        Ok(Some(format!("{}?{}", vendor_endpoint, query)))
    }
}
