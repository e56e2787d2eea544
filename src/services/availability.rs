//! Multi-backend availability resolution
//!
//! One resolver is created per request and dropped with it; the memoized
//! backend maps never outlive the request or leak across records.
//!
//! Policy per item:
//! - offsite holding: SCSB is authoritative, keyed by barcode;
//! - onsite holding: FOLIO is authoritative, keyed by item id;
//! - onsite + Clancy-managed location + FOLIO "Available": confirm against
//!   CaiaSoft, whose status string doubles as a restriction annotation.

use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::backends::caiasoft::ITEM_IN_AT_REST;
use crate::backends::Backends;
use crate::models::availability::{AvailabilityMap, ItemStatus};
use crate::models::bib::{BibRecord, Holding, Item};

#[derive(Clone)]
pub struct AvailabilityResolver {
    backends: Backends,
    clancy_locations: Arc<Vec<String>>,
    /// Barcode-keyed SCSB map; None inside the cell when the fetch failed.
    scsb: OnceCell<Option<AvailabilityMap>>,
    /// Item-id-keyed FOLIO map; individual failures degrade per item.
    folio: OnceCell<AvailabilityMap>,
}

impl AvailabilityResolver {
    pub fn new(backends: Backends, clancy_locations: Arc<Vec<String>>) -> Self {
        Self {
            backends,
            clancy_locations,
            scsb: OnceCell::new(),
            folio: OnceCell::new(),
        }
    }

    /// Clancy management is a configured allow-list, independent of the
    /// offsite classification.
    pub fn is_clancy_location(&self, location_code: &str) -> bool {
        self.clancy_locations.iter().any(|c| c == location_code)
    }

    /// The SCSB availability map for this record, fetched once.
    /// Returns None when the backend call failed.
    pub async fn scsb_availability(&self, record: &BibRecord) -> Option<&AvailabilityMap> {
        self.scsb
            .get_or_init(|| async {
                let (institution, institution_id) = scsb_query_ids(record);
                match self
                    .backends
                    .scsb
                    .bib_availability(&institution_id, &institution)
                    .await
                {
                    Ok(rows) => Some(
                        rows.into_iter()
                            .map(|row| {
                                let status = row.status.as_deref().unwrap_or("");
                                (row.barcode, ItemStatus::from_backend(status))
                            })
                            .collect(),
                    ),
                    Err(e) => {
                        tracing::error!("SCSB availability for {} failed: {}", record.id, e);
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    /// The FOLIO availability map for this record, fetched once with one
    /// concurrent lookup per item.  A failed lookup degrades that single item
    /// to Unavailable; the batch never aborts.
    pub async fn folio_availability(&self, record: &BibRecord) -> &AvailabilityMap {
        self.folio
            .get_or_init(|| async {
                let lookups = record
                    .holdings
                    .iter()
                    .flat_map(|h| h.items.iter())
                    .map(|item| {
                        let folio = self.backends.folio.clone();
                        let item_id = item.item_id.clone();
                        async move {
                            let status = match folio.item_status(&item_id).await {
                                Ok(name) => ItemStatus::from_backend(&name),
                                Err(e) => {
                                    tracing::warn!("FOLIO status for {} failed: {}", item_id, e);
                                    ItemStatus::Unavailable
                                }
                            };
                            (item_id, status)
                        }
                    });
                futures::future::join_all(lookups).await.into_iter().collect()
            })
            .await
    }

    /// Authoritative status for a single item of this record.
    pub async fn item_status(
        &self,
        record: &BibRecord,
        holding: &Holding,
        item: &Item,
    ) -> ItemStatus {
        // Offsite items answer from SCSB alone, never FOLIO.
        if holding.is_offsite() {
            return match self.scsb_availability(record).await {
                Some(map) => map
                    .get(&item.barcode)
                    .cloned()
                    // Missing from a successful response: not yet accessioned
                    // or another data gap, not the same thing as unavailable.
                    .unwrap_or(ItemStatus::Unknown),
                None => ItemStatus::Unavailable,
            };
        }

        let status = self
            .folio_availability(record)
            .await
            .get(&item.item_id)
            .cloned()
            .unwrap_or(ItemStatus::Unavailable);

        // An "Available" answer for a Clancy-managed location still needs the
        // CaiaSoft shelf check; the item may be out of the repository.
        if status.is_available() && self.is_clancy_location(&holding.location_code) {
            return match self.backends.caiasoft.item_status(&item.barcode).await {
                Ok(caiasoft_status) if caiasoft_status == ITEM_IN_AT_REST => ItemStatus::Available,
                Ok(caiasoft_status) => ItemStatus::Restricted(caiasoft_status),
                Err(e) => {
                    tracing::warn!("CaiaSoft status for {} failed: {}", item.barcode, e);
                    ItemStatus::Unavailable
                }
            };
        }

        status
    }

    /// Merged per-record availability: offsite items keyed by barcode,
    /// onsite items keyed by item id.
    pub async fn resolve(&self, record: &BibRecord) -> AvailabilityMap {
        let mut map = AvailabilityMap::new();
        for holding in &record.holdings {
            for item in &holding.items {
                let status = self.item_status(record, holding, item).await;
                let key = if holding.is_offsite() {
                    item.barcode.clone()
                } else {
                    item.item_id.clone()
                };
                map.insert(key, status);
            }
        }
        map
    }

    /// The items of the given holdings whose resolved status is Available.
    pub async fn available_items<'a>(
        &self,
        record: &BibRecord,
        holdings: &[&'a Holding],
    ) -> Vec<&'a Item> {
        let mut available = Vec::new();
        for holding in holdings {
            for item in &holding.items {
                if self.item_status(record, holding, item).await.is_available() {
                    available.push(item);
                }
            }
        }
        available
    }
}

/// SCSB availability is queried with the owning institution's ids: local
/// records use the local bib id, shared-collection records strip the
/// SCSB- prefix.
fn scsb_query_ids(record: &BibRecord) -> (String, String) {
    if let Some(stripped) = record.id.strip_prefix("SCSB-") {
        ("SCSB".to_string(), stripped.to_string())
    } else {
        ("CUL".to_string(), record.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::caiasoft::MockCaiasoftBackend;
    use crate::backends::discovery::MockDiscoveryBackend;
    use crate::backends::folio::MockFolioBackend;
    use crate::backends::scsb::{BarcodeStatus, MockScsbBackend};
    use crate::error::AppError;
    use crate::models::bib::{Holding, Item};

    fn item(id: &str, barcode: &str) -> Item {
        Item {
            item_id: id.to_string(),
            barcode: barcode.to_string(),
            ..Default::default()
        }
    }

    fn holding(mfhd_id: &str, location_code: &str, items: Vec<Item>) -> Holding {
        Holding {
            mfhd_id: mfhd_id.to_string(),
            location_code: location_code.to_string(),
            items,
            ..Default::default()
        }
    }

    fn record(id: &str, holdings: Vec<Holding>) -> BibRecord {
        BibRecord {
            id: id.to_string(),
            holdings,
            ..Default::default()
        }
    }

    fn backends(
        folio: MockFolioBackend,
        scsb: MockScsbBackend,
        caiasoft: MockCaiasoftBackend,
    ) -> Backends {
        Backends {
            discovery: Arc::new(MockDiscoveryBackend::new()),
            folio: Arc::new(folio),
            scsb: Arc::new(scsb),
            caiasoft: Arc::new(caiasoft),
        }
    }

    fn scsb_row(barcode: &str, status: &str) -> BarcodeStatus {
        BarcodeStatus {
            barcode: barcode.to_string(),
            status: Some(status.to_string()),
            error_message: None,
        }
    }

    fn resolver(backends: Backends, clancy: &[&str]) -> AvailabilityResolver {
        AvailabilityResolver::new(
            backends,
            Arc::new(clancy.iter().map(|s| s.to_string()).collect()),
        )
    }

    #[tokio::test]
    async fn offsite_items_answer_from_scsb_not_folio() {
        // No FOLIO expectations: any FOLIO call would panic the mock.
        let folio = MockFolioBackend::new();
        let mut scsb = MockScsbBackend::new();
        scsb.expect_bib_availability()
            .times(1)
            .returning(|_, _| Ok(vec![scsb_row("CU0001", "Available")]));
        let caiasoft = MockCaiasoftBackend::new();

        let record = record(
            "123",
            vec![holding("h1", "off,rcp1", vec![item("i1", "CU0001")])],
        );
        let resolver = resolver(backends(folio, scsb, caiasoft), &[]);

        let status = resolver
            .item_status(&record, &record.holdings[0], &record.holdings[0].items[0])
            .await;
        assert_eq!(status, ItemStatus::Available);
    }

    #[tokio::test]
    async fn offsite_item_missing_from_scsb_is_unknown() {
        let folio = MockFolioBackend::new();
        let mut scsb = MockScsbBackend::new();
        scsb.expect_bib_availability()
            .returning(|_, _| Ok(vec![scsb_row("CU9999", "Available")]));
        let caiasoft = MockCaiasoftBackend::new();

        let record = record(
            "123",
            vec![holding("h1", "off,rcp1", vec![item("i1", "CU0001")])],
        );
        let resolver = resolver(backends(folio, scsb, caiasoft), &[]);

        let status = resolver
            .item_status(&record, &record.holdings[0], &record.holdings[0].items[0])
            .await;
        assert_eq!(status, ItemStatus::Unknown);
    }

    #[tokio::test]
    async fn scsb_failure_degrades_to_unavailable() {
        let folio = MockFolioBackend::new();
        let mut scsb = MockScsbBackend::new();
        scsb.expect_bib_availability()
            .returning(|_, _| Err(AppError::Backend("timeout".to_string())));
        let caiasoft = MockCaiasoftBackend::new();

        let record = record(
            "123",
            vec![holding("h1", "off,rcp1", vec![item("i1", "CU0001")])],
        );
        let resolver = resolver(backends(folio, scsb, caiasoft), &[]);

        let status = resolver
            .item_status(&record, &record.holdings[0], &record.holdings[0].items[0])
            .await;
        assert_eq!(status, ItemStatus::Unavailable);
    }

    #[tokio::test]
    async fn onsite_non_clancy_uses_folio_only() {
        let mut folio = MockFolioBackend::new();
        folio
            .expect_item_status()
            .times(1)
            .returning(|_| Ok("Available".to_string()));
        // No SCSB or CaiaSoft expectations.
        let scsb = MockScsbBackend::new();
        let caiasoft = MockCaiasoftBackend::new();

        let record = record("123", vec![holding("h1", "glx", vec![item("i1", "CU0001")])]);
        let resolver = resolver(backends(folio, scsb, caiasoft), &["bar,stor"]);

        let status = resolver
            .item_status(&record, &record.holdings[0], &record.holdings[0].items[0])
            .await;
        assert_eq!(status, ItemStatus::Available);
    }

    #[tokio::test]
    async fn clancy_available_item_is_confirmed_against_caiasoft() {
        let mut folio = MockFolioBackend::new();
        folio
            .expect_item_status()
            .returning(|_| Ok("Available".to_string()));
        let scsb = MockScsbBackend::new();
        let mut caiasoft = MockCaiasoftBackend::new();
        caiasoft
            .expect_item_status()
            .times(1)
            .returning(|_| Ok(ITEM_IN_AT_REST.to_string()));

        let record = record(
            "123",
            vec![holding("h1", "bar,stor", vec![item("i1", "CU0001")])],
        );
        let resolver = resolver(backends(folio, scsb, caiasoft), &["bar,stor"]);

        let status = resolver
            .item_status(&record, &record.holdings[0], &record.holdings[0].items[0])
            .await;
        assert_eq!(status, ItemStatus::Available);
    }

    #[tokio::test]
    async fn clancy_not_at_rest_becomes_restriction_annotation() {
        let mut folio = MockFolioBackend::new();
        folio
            .expect_item_status()
            .returning(|_| Ok("Available".to_string()));
        let scsb = MockScsbBackend::new();
        let mut caiasoft = MockCaiasoftBackend::new();
        caiasoft
            .expect_item_status()
            .returning(|_| Ok("Out on Exhibit".to_string()));

        let record = record(
            "123",
            vec![holding("h1", "bar,stor", vec![item("i1", "CU0001")])],
        );
        let resolver = resolver(backends(folio, scsb, caiasoft), &["bar,stor"]);

        let status = resolver
            .item_status(&record, &record.holdings[0], &record.holdings[0].items[0])
            .await;
        assert_eq!(status, ItemStatus::Restricted("Out on Exhibit".to_string()));
        assert_eq!(status.restriction(), Some("Out on Exhibit"));
    }

    #[tokio::test]
    async fn checked_out_clancy_item_skips_caiasoft() {
        let mut folio = MockFolioBackend::new();
        folio
            .expect_item_status()
            .returning(|_| Ok("Checked out".to_string()));
        let scsb = MockScsbBackend::new();
        // Any CaiaSoft call would panic the mock.
        let caiasoft = MockCaiasoftBackend::new();

        let record = record(
            "123",
            vec![holding("h1", "bar,stor", vec![item("i1", "CU0001")])],
        );
        let resolver = resolver(backends(folio, scsb, caiasoft), &["bar,stor"]);

        let status = resolver
            .item_status(&record, &record.holdings[0], &record.holdings[0].items[0])
            .await;
        assert_eq!(status, ItemStatus::CheckedOut);
    }

    #[tokio::test]
    async fn folio_failure_for_one_item_leaves_others_intact() {
        let mut folio = MockFolioBackend::new();
        folio.expect_item_status().returning(|item_id| {
            if item_id == "i1" {
                Err(AppError::Backend("boom".to_string()))
            } else {
                Ok("Available".to_string())
            }
        });
        let scsb = MockScsbBackend::new();
        let caiasoft = MockCaiasoftBackend::new();

        let record = record(
            "123",
            vec![holding(
                "h1",
                "glx",
                vec![item("i1", "CU0001"), item("i2", "CU0002")],
            )],
        );
        let resolver = resolver(backends(folio, scsb, caiasoft), &[]);

        let map = resolver.folio_availability(&record).await;
        assert_eq!(map.get("i1"), Some(&ItemStatus::Unavailable));
        assert_eq!(map.get("i2"), Some(&ItemStatus::Available));
    }

    #[tokio::test]
    async fn merged_map_keys_offsite_by_barcode_and_onsite_by_item_id() {
        let mut folio = MockFolioBackend::new();
        folio
            .expect_item_status()
            .returning(|_| Ok("Available".to_string()));
        let mut scsb = MockScsbBackend::new();
        scsb.expect_bib_availability()
            .returning(|_, _| Ok(vec![scsb_row("CU0002", "Available")]));
        let caiasoft = MockCaiasoftBackend::new();

        let record = record(
            "123",
            vec![
                holding("h1", "glx", vec![item("i1", "CU0001")]),
                holding("h2", "off,glx", vec![item("i2", "CU0002")]),
            ],
        );
        let resolver = resolver(backends(folio, scsb, caiasoft), &[]);

        let map = resolver.resolve(&record).await;
        assert_eq!(map.get("i1"), Some(&ItemStatus::Available));
        assert_eq!(map.get("CU0002"), Some(&ItemStatus::Available));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn scsb_query_ids_strip_shared_collection_prefix() {
        let local = record("123", vec![]);
        assert_eq!(
            scsb_query_ids(&local),
            ("CUL".to_string(), "123".to_string())
        );
        let shared = record("SCSB-456", vec![]);
        assert_eq!(
            scsb_query_ids(&shared),
            ("SCSB".to_string(), "456".to_string())
        );
    }
}
