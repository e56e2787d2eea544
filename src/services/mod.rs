//! Business logic services

pub mod audit;
pub mod availability;
pub mod catalog;
pub mod email;
pub mod illiad;
pub mod patrons;
pub mod records;
pub mod strategies;
pub mod workflow;

use sqlx::PgPool;
use std::sync::Arc;

use crate::backends::patron_db::PatronDb;
use crate::backends::Backends;
use crate::config::AppConfig;
use crate::error::AppResult;
use crate::marc::BibTranslator;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<catalog::ServiceCatalog>,
    pub records: records::RecordService,
    pub workflow: Arc<workflow::RequestWorkflow>,
    pub patrons: patrons::PatronDirectory,
    pub mailer: Arc<email::Mailer>,
    pub audit: audit::AuditLog,
}

impl Services {
    /// Create all services with the given backends and database pool.
    pub fn new(config: Arc<AppConfig>, backends: Backends, pool: PgPool) -> AppResult<Self> {
        let translator = BibTranslator::new(config.discovery.finding_aid_hosts.clone());
        let records = records::RecordService::new(backends.discovery.clone(), translator);
        let catalog = Arc::new(catalog::ServiceCatalog::from_config(&config, &backends)?);
        let mailer = Arc::new(email::Mailer::new(config.email.clone()));
        let audit = audit::AuditLog::new(pool.clone());
        let patrons = patrons::PatronDirectory::new(
            config.ils.mode,
            backends.folio.clone(),
            PatronDb::new(pool),
            config.auth.email_domain.clone(),
        );
        let workflow = Arc::new(workflow::RequestWorkflow::new(
            config,
            catalog.clone(),
            records.clone(),
            backends,
            mailer.clone(),
            audit.clone(),
        ));

        Ok(Self {
            catalog,
            records,
            workflow,
            patrons,
            mailer,
            audit,
        })
    }
}
