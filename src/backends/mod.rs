//! Opaque backend collaborators.
//!
//! Each downstream system is a trait plus one HTTP/SQL implementation; the
//! traits are the seams the resolver and strategies are tested through.

pub mod caiasoft;
pub mod discovery;
pub mod folio;
pub mod patron_db;
pub mod scsb;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppResult;

pub use caiasoft::CaiasoftBackend;
pub use discovery::DiscoveryBackend;
pub use folio::FolioBackend;
pub use scsb::{BarcodeStatus, ScsbBackend};

/// Handles to every backend, shared across the process.
#[derive(Clone)]
pub struct Backends {
    pub discovery: Arc<dyn DiscoveryBackend>,
    pub folio: Arc<dyn FolioBackend>,
    pub scsb: Arc<dyn ScsbBackend>,
    pub caiasoft: Arc<dyn CaiasoftBackend>,
}

impl Backends {
    /// Build the HTTP clients from configuration.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            discovery: Arc::new(discovery::HttpDiscovery::new(&config.discovery)?),
            folio: Arc::new(folio::OkapiFolio::new(&config.folio)?),
            scsb: Arc::new(scsb::ScsbRest::new(&config.scsb)?),
            caiasoft: Arc::new(caiasoft::CaiasoftHttp::new(&config.caiasoft)?),
        })
    }
}
