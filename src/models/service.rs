//! Static service configuration.

use serde::Deserialize;
use std::collections::HashMap;

/// How a service answers a GET: render its form, or bounce the patron
/// straight to an external system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchKind {
    Form,
    Bounce,
}

/// One entry of the service table.  Loaded once at startup; read-only during
/// request handling.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDefinition {
    /// The service key; filled in from the table key at startup.
    #[serde(skip)]
    pub key: String,
    pub label: String,
    pub kind: DispatchKind,
    #[serde(default)]
    pub authenticate: bool,
    /// Strategy implementation name; defaults to the service key.
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub permitted_affils: Vec<String>,
    #[serde(default)]
    pub denied_affils: Vec<String>,
    /// Single filter location (remote-storage style services).
    #[serde(default)]
    pub location_code: Option<String>,
    /// Multi-location filter list.
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub staff_email: Option<String>,
    /// Pass-through endpoint for vendor-bounce services.
    #[serde(default)]
    pub vendor_endpoint: Option<String>,
    /// Special Collections: location code -> reading-room site.
    #[serde(default)]
    pub sites: HashMap<String, String>,
    /// Special Collections locations requested at the holding level rather
    /// than per item.
    #[serde(default)]
    pub holding_level_sites: Vec<String>,
}

impl ServiceDefinition {
    /// The strategy implementation this definition asks for.
    pub fn strategy_name(&self) -> &str {
        self.strategy.as_deref().unwrap_or(&self.key)
    }

    /// All filter locations, whether configured singly or as a list.
    pub fn filter_locations(&self) -> Vec<&str> {
        let mut locations: Vec<&str> = self.locations.iter().map(String::as_str).collect();
        if let Some(code) = self.location_code.as_deref() {
            if !locations.contains(&code) {
                locations.push(code);
            }
        }
        locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_name_defaults_to_key() {
        let mut def: ServiceDefinition =
            serde_json::from_value(serde_json::json!({"label": "X", "kind": "form"})).unwrap();
        def.key = "bearstor".to_string();
        assert_eq!(def.strategy_name(), "bearstor");
        def.strategy = Some("remote_storage".to_string());
        assert_eq!(def.strategy_name(), "remote_storage");
    }

    #[test]
    fn filter_locations_merges_single_and_list() {
        let mut def: ServiceDefinition = serde_json::from_value(serde_json::json!({
            "label": "X",
            "kind": "form",
            "location_code": "bar,stor",
            "locations": ["ean,stor"]
        }))
        .unwrap();
        def.key = "x".to_string();
        assert_eq!(def.filter_locations(), vec!["ean,stor", "bar,stor"]);
    }
}
