//! Legacy ILS patron lookup
//!
//! Used only when the ILS mode is `legacy`: the patron barcode comes from a
//! synchronous query against the old circulation database.

use sqlx::{PgPool, Row};

use crate::error::AppResult;

#[derive(Clone)]
pub struct PatronDb {
    pool: PgPool,
}

impl PatronDb {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active circulation barcode for a patron, when one exists.
    pub async fn patron_barcode(&self, uni: &str) -> AppResult<Option<String>> {
        let row = sqlx::query(
            "SELECT barcode FROM patron_barcodes \
             WHERE uni = $1 AND status = 'active' \
             ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(uni)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get::<String, _>("barcode")))
    }

    /// Barcodes superseded by a re-carding, included in some staff emails.
    pub async fn inactive_barcodes(&self, barcode: &str) -> AppResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT b.barcode FROM patron_barcodes b \
             JOIN patron_barcodes active ON active.uni = b.uni \
             WHERE active.barcode = $1 AND b.status = 'inactive'",
        )
        .bind(barcode)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| r.get::<String, _>("barcode"))
            .collect())
    }
}
