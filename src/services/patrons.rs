//! Patron directory
//!
//! Builds the Patron aggregate from the pre-authenticated identity, filling
//! in the circulation barcode from whichever ILS is configured.

use std::sync::Arc;

use crate::backends::patron_db::PatronDb;
use crate::backends::FolioBackend;
use crate::config::IlsMode;
use crate::error::AppResult;
use crate::models::Patron;

#[derive(Clone)]
pub struct PatronDirectory {
    mode: IlsMode,
    folio: Arc<dyn FolioBackend>,
    patron_db: PatronDb,
    email_domain: String,
}

impl PatronDirectory {
    pub fn new(
        mode: IlsMode,
        folio: Arc<dyn FolioBackend>,
        patron_db: PatronDb,
        email_domain: String,
    ) -> Self {
        Self {
            mode,
            folio,
            patron_db,
            email_domain,
        }
    }

    /// Assemble the patron for a request.  A failed barcode lookup degrades
    /// to no barcode rather than failing the request.
    pub async fn resolve(
        &self,
        uni: &str,
        email: Option<String>,
        affils: Vec<String>,
    ) -> Patron {
        let email = email.unwrap_or_else(|| {
            tracing::debug!("no email supplied for {}, assuming @{}", uni, self.email_domain);
            format!("{}@{}", uni, self.email_domain)
        });

        let barcode = match self.lookup_barcode(uni).await {
            Ok(barcode) => barcode,
            Err(e) => {
                tracing::warn!("patron barcode lookup for {} failed: {}", uni, e);
                None
            }
        };

        Patron {
            uni: uni.to_string(),
            email,
            barcode,
            affils,
        }
    }

    /// Barcode lookup through the configured ILS.
    pub async fn lookup_barcode(&self, uni: &str) -> AppResult<Option<String>> {
        match self.mode {
            IlsMode::Folio => self.folio.user_barcode(uni).await,
            IlsMode::Legacy => self.patron_db.patron_barcode(uni).await,
        }
    }
}
