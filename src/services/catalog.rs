//! Service catalog
//!
//! Startup-time registry from service key to configuration + strategy
//! instance.  A key without a definition, or a definition naming an unknown
//! strategy, is a configuration error - surfaced at boot, not to a patron.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backends::Backends;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::ServiceDefinition;
use crate::services::strategies::{self, ServiceStrategy};

/// A resolved service: its static definition plus the strategy that runs it.
#[derive(Clone)]
pub struct ResolvedService {
    pub definition: ServiceDefinition,
    pub strategy: Arc<dyn ServiceStrategy>,
}

impl std::fmt::Debug for ResolvedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedService")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct ServiceCatalog {
    services: HashMap<String, ResolvedService>,
}

impl ServiceCatalog {
    /// Instantiate every configured service once.
    pub fn from_config(config: &Arc<AppConfig>, backends: &Backends) -> AppResult<Self> {
        let mut services = HashMap::new();
        for (key, definition) in &config.services {
            let mut definition = definition.clone();
            definition.key = key.clone();
            let strategy = strategies::build_strategy(&definition, config, backends)?;
            tracing::debug!("registered service {} ({})", key, definition.label);
            services.insert(
                key.clone(),
                ResolvedService {
                    definition,
                    strategy,
                },
            );
        }
        Ok(Self { services })
    }

    /// Resolve a service key extracted from the inbound path.
    pub fn resolve(&self, key: &str) -> AppResult<&ResolvedService> {
        self.services.get(key).ok_or_else(|| {
            AppError::Configuration(format!("No configuration found for service {}", key))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.services.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::caiasoft::MockCaiasoftBackend;
    use crate::backends::discovery::MockDiscoveryBackend;
    use crate::backends::folio::MockFolioBackend;
    use crate::backends::scsb::MockScsbBackend;

    fn mock_backends() -> Backends {
        Backends {
            discovery: Arc::new(MockDiscoveryBackend::new()),
            folio: Arc::new(MockFolioBackend::new()),
            scsb: Arc::new(MockScsbBackend::new()),
            caiasoft: Arc::new(MockCaiasoftBackend::new()),
        }
    }

    #[test]
    fn every_configured_service_resolves() {
        let config = crate::test_support::test_config();
        let catalog = ServiceCatalog::from_config(&config, &mock_backends()).unwrap();
        for key in config.services.keys() {
            let resolved = catalog.resolve(key).unwrap();
            assert_eq!(&resolved.definition.key, key);
        }
    }

    #[test]
    fn unknown_key_is_a_configuration_error() {
        let config = crate::test_support::test_config();
        let catalog = ServiceCatalog::from_config(&config, &mock_backends()).unwrap();
        let err = catalog.resolve("no_such_service").unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn unknown_strategy_name_fails_at_startup() {
        let config = crate::test_support::test_config();
        let mut bad = (*config).clone();
        if let Some(def) = bad.services.get_mut("paging") {
            def.strategy = Some("no_such_strategy".to_string());
        }
        let err = ServiceCatalog::from_config(&Arc::new(bad), &mock_backends()).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
