//! Special Collections reading-room requests.
//!
//! Whether the patron sees a form depends on the record: a finding aid or a
//! single requestable container bounces straight to the reading-room system;
//! multiple containers render a picker.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::marc::text::natural_sort_key;
use crate::models::bib::Holding;
use crate::models::{BibRecord, DispatchKind, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::strategies::ServiceStrategy;
use crate::services::workflow::RequestParams;

/// A requestable unit: an item, or a whole holding where the location's
/// policy is holding-level requests only.
#[derive(Debug, Clone, Serialize)]
pub struct Container {
    /// Item id, or the mfhd id for holding-level containers.
    pub id: String,
    pub call_number: Option<String>,
    pub enum_chron: Option<String>,
    pub barcode: Option<String>,
    pub label: String,
    pub holding_level: bool,
}

pub struct SpecialCollections {
    definition: ServiceDefinition,
    config: Arc<AppConfig>,
}

impl SpecialCollections {
    pub fn new(definition: ServiceDefinition, config: Arc<AppConfig>) -> Self {
        Self { definition, config }
    }

    /// Holdings at any location with a configured reading-room site.
    fn site_holdings<'a>(&self, record: &'a BibRecord) -> Vec<&'a Holding> {
        record
            .holdings
            .iter()
            .filter(|holding| self.definition.sites.contains_key(&holding.location_code))
            .collect()
    }

    fn is_holding_level(&self, location_code: &str) -> bool {
        self.definition
            .holding_level_sites
            .iter()
            .any(|code| code == location_code)
    }

    /// Every requestable container of this record, natural-sorted by label
    /// so "Box 2" precedes "Box 10".
    fn container_list(&self, record: &BibRecord) -> Vec<Container> {
        let mut containers = Vec::new();
        for holding in self.site_holdings(record) {
            let call_number = holding.display_call_number.clone();
            if self.is_holding_level(&holding.location_code) {
                containers.push(Container {
                    id: holding.mfhd_id.clone(),
                    label: call_number.clone().unwrap_or_default(),
                    call_number,
                    enum_chron: None,
                    barcode: None,
                    holding_level: true,
                });
                continue;
            }
            for item in &holding.items {
                let label = [
                    call_number.as_deref().unwrap_or(""),
                    item.enum_chron.as_deref().unwrap_or(""),
                ]
                .join(" ")
                .trim()
                .to_string();
                containers.push(Container {
                    id: item.item_id.clone(),
                    call_number: call_number.clone(),
                    enum_chron: item.enum_chron.clone(),
                    barcode: Some(item.barcode.clone()),
                    label,
                    holding_level: false,
                });
            }
        }
        containers.sort_by_key(|container| natural_sort_key(&container.label));
        containers
    }

    /// The reading-room OpenURL for one requested container.
    fn build_aeon_url(&self, record: &BibRecord, requested_container_id: &str) -> String {
        let mut aeon_params: BTreeMap<String, String> = BTreeMap::new();

        // Bib-level parameters
        aeon_params.insert("ReferenceNumber".to_string(), record.id.clone());
        aeon_params.insert("ItemAuthor".to_string(), record.author.clone());
        aeon_params.insert("ItemTitle".to_string(), record.title.clone());
        aeon_params.insert("ItemPlace".to_string(), record.pub_place.clone());
        aeon_params.insert("ItemPublisher".to_string(), record.pub_name.clone());
        aeon_params.insert("ItemDate".to_string(), record.pub_date.clone());
        if let Some(dates) = &record.aeon_dates {
            aeon_params.insert("ItemDates".to_string(), dates.clone());
        }
        if let Some(format) = &record.aeon_format {
            aeon_params.insert("ItemInfo1".to_string(), format.clone());
        }
        if let Some(restriction) = &record.access_restriction {
            aeon_params.insert("ItemInfo3".to_string(), restriction.clone());
        }

        // Holding/item-level parameters for the container being requested
        for holding in self.site_holdings(record) {
            let site = self.definition.sites.get(&holding.location_code);
            if self.is_holding_level(&holding.location_code) {
                if holding.mfhd_id != requested_container_id {
                    continue;
                }
            } else if !holding
                .items
                .iter()
                .any(|item| item.item_id == requested_container_id)
            {
                continue;
            }

            aeon_params.insert("Location".to_string(), holding.location_display.clone());
            aeon_params.insert(
                "CallNumber".to_string(),
                holding.display_call_number.clone().unwrap_or_default(),
            );
            if let Some(item) = holding
                .items
                .iter()
                .find(|item| item.item_id == requested_container_id)
            {
                aeon_params.insert(
                    "ItemVolume".to_string(),
                    item.enum_chron.clone().unwrap_or_default(),
                );
                aeon_params.insert("ItemNumber".to_string(), item.barcode.clone());
            }
            if let Some(site) = site {
                aeon_params.insert("Site".to_string(), site.clone());
            }
        }

        // Fixed parameters the reading-room system expects on every request
        aeon_params.insert("Action".to_string(), "10".to_string());
        aeon_params.insert("Form".to_string(), "20".to_string());
        aeon_params.insert("Value".to_string(), "GenericRequestAll".to_string());
        aeon_params.insert("DocumentType".to_string(), "All".to_string());

        let query = aeon_params
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.config.aeon.base_url, query)
    }
}

#[async_trait]
impl ServiceStrategy for SpecialCollections {
    async fn bib_eligible(
        &self,
        record: &BibRecord,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<()> {
        if self.site_holdings(record).is_empty() {
            return Err(AppError::Ineligible(
                "This record has no holdings in any Special Collections library. \
                 Requests can only be made for Special Collections items."
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Bounce or form depends on the record: a finding aid bounces, a single
    /// container bounces, multiple containers render the picker.
    fn dispatch_kind(&self, _configured: DispatchKind, record: Option<&BibRecord>) -> DispatchKind {
        let Some(record) = record else {
            return DispatchKind::Form;
        };
        if record.finding_aid_url.is_some() {
            return DispatchKind::Bounce;
        }
        if self.container_list(record).len() == 1 {
            return DispatchKind::Bounce;
        }
        DispatchKind::Form
    }

    async fn form_locals(
        &self,
        _params: &RequestParams,
        record: Option<&BibRecord>,
        _user: Option<&Patron>,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Value> {
        let containers = record.map(|record| self.container_list(record));
        Ok(json!({
            "record": record,
            "containers": containers,
        }))
    }

    async fn service_url(
        &self,
        params: &RequestParams,
        record: Option<&BibRecord>,
        _user: Option<&Patron>,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Option<String>> {
        let Some(record) = record else {
            return Ok(None);
        };

        // A finding aid trumps everything else.
        if let Some(finding_aid) = &record.finding_aid_url {
            tracing::debug!("{} has a finding aid link", record.id);
            return Ok(Some(finding_aid.clone()));
        }

        // With a single container the patron never sees a picker.
        let containers = self.container_list(record);
        let requested = if containers.len() == 1 {
            tracing::debug!("{} has only a single container", record.id);
            Some(containers[0].id.clone())
        } else {
            params.get("item_id").map(str::to_string)
        };

        let Some(requested) = requested else {
            return Ok(None);
        };
        Ok(Some(self.build_aeon_url(record, &requested)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bib::Item;

    fn definition() -> ServiceDefinition {
        let mut def: ServiceDefinition = serde_json::from_value(json!({
            "label": "Special Collections Request",
            "kind": "form",
            "authenticate": true,
            "sites": { "rbml": "RBML", "oral": "ORAL" },
            "holding_level_sites": ["oral"]
        }))
        .unwrap();
        def.key = "special_collections".to_string();
        def
    }

    fn config() -> Arc<AppConfig> {
        crate::test_support::test_config()
    }

    fn item(id: &str, enum_chron: &str) -> Item {
        Item {
            item_id: id.to_string(),
            barcode: format!("BC{}", id),
            enum_chron: Some(enum_chron.to_string()),
            ..Default::default()
        }
    }

    fn record_with_items(items: Vec<Item>) -> BibRecord {
        BibRecord {
            id: "123".to_string(),
            holdings: vec![Holding {
                mfhd_id: "h1".to_string(),
                location_code: "rbml".to_string(),
                location_display: "Rare Books".to_string(),
                display_call_number: Some("MS#0123".to_string()),
                items,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn containers_natural_sort_by_label() {
        let service = SpecialCollections::new(definition(), config());
        let record = record_with_items(vec![
            item("i1", "Box 2"),
            item("i2", "Box 10"),
            item("i3", "Box 1"),
        ]);
        let labels: Vec<String> = service
            .container_list(&record)
            .into_iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(
            labels,
            vec!["MS#0123 Box 1", "MS#0123 Box 2", "MS#0123 Box 10"]
        );
    }

    #[test]
    fn finding_aid_forces_bounce() {
        let service = SpecialCollections::new(definition(), config());
        let mut record = record_with_items(vec![item("i1", "Box 1"), item("i2", "Box 2")]);
        assert_eq!(
            service.dispatch_kind(DispatchKind::Form, Some(&record)),
            DispatchKind::Form
        );
        record.finding_aid_url = Some("https://findingaids.example.org/ead/x".to_string());
        assert_eq!(
            service.dispatch_kind(DispatchKind::Form, Some(&record)),
            DispatchKind::Bounce
        );
    }

    #[test]
    fn single_container_bounces_directly() {
        let service = SpecialCollections::new(definition(), config());
        let record = record_with_items(vec![item("i1", "Box 1")]);
        assert_eq!(
            service.dispatch_kind(DispatchKind::Form, Some(&record)),
            DispatchKind::Bounce
        );
    }

    #[test]
    fn holding_level_location_yields_one_container_per_holding() {
        let service = SpecialCollections::new(definition(), config());
        let mut record = record_with_items(vec![]);
        record.holdings[0].location_code = "oral".to_string();
        record.holdings[0].items = vec![item("i1", "Box 1"), item("i2", "Box 2")];
        let containers = service.container_list(&record);
        assert_eq!(containers.len(), 1);
        assert!(containers[0].holding_level);
        assert_eq!(containers[0].id, "h1");
    }

    #[test]
    fn aeon_url_carries_container_and_site() {
        let service = SpecialCollections::new(definition(), config());
        let record = record_with_items(vec![item("i1", "Box 1")]);
        let url = service.build_aeon_url(&record, "i1");
        assert!(url.contains("Site=RBML"));
        assert!(url.contains("ReferenceNumber=123"));
        assert!(url.contains("ItemVolume=Box%201"));
        assert!(url.contains("Value=GenericRequestAll"));
    }
}
