//! Record lookup service
//!
//! Front door from an external identifier to the immutable bib graph: the
//! discovery backend serves raw MARC, the translator builds the model.

use std::sync::Arc;

use crate::backends::DiscoveryBackend;
use crate::error::{AppError, AppResult};
use crate::marc::{BibTranslator, MarcRecord};
use crate::models::BibRecord;

#[derive(Clone)]
pub struct RecordService {
    discovery: Arc<dyn DiscoveryBackend>,
    translator: Arc<BibTranslator>,
}

impl RecordService {
    pub fn new(discovery: Arc<dyn DiscoveryBackend>, translator: BibTranslator) -> Self {
        Self {
            discovery,
            translator: Arc::new(translator),
        }
    }

    /// Build the bib graph for a bib id.
    pub async fn record_for_bib_id(&self, bib_id: &str) -> AppResult<BibRecord> {
        if bib_id.is_empty() {
            return Err(AppError::NotFound("No record id supplied".to_string()));
        }
        let raw = self
            .discovery
            .lookup_bib(bib_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Cannot find bib record for id {}", bib_id)))?;
        self.build(&raw, bib_id)
    }

    /// Build the bib graph for the record containing an item barcode.
    pub async fn record_for_barcode(&self, barcode: &str) -> AppResult<BibRecord> {
        if barcode.is_empty() {
            return Err(AppError::NotFound("No barcode supplied".to_string()));
        }
        let raw = self.discovery.lookup_barcode(barcode).await?.ok_or_else(|| {
            AppError::NotFound(format!("Cannot find any record for barcode {}", barcode))
        })?;
        self.build(&raw, barcode)
    }

    fn build(&self, raw: &[u8], identifier: &str) -> AppResult<BibRecord> {
        let marc = MarcRecord::from_bytes(raw).ok_or_else(|| {
            tracing::error!("unparseable MARC payload for {}", identifier);
            AppError::NotFound(format!("Cannot find bib record for id {}", identifier))
        })?;
        self.translator.translate(&marc)
    }
}
