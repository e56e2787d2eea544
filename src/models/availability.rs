//! Item availability vocabulary and per-record availability maps.

use serde::Serialize;
use std::collections::HashMap;

/// Resolved status of a single item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Available,
    CheckedOut,
    Unavailable,
    /// Offsite item with no entry in the shared-collection response.
    /// A data-integrity gap, deliberately distinct from `Unavailable`.
    Unknown,
    /// CaiaSoft reported the item not at rest; the status string doubles as a
    /// use-restriction annotation for display.
    Restricted(String),
    /// Any other backend-reported status ("In transit", "Missing", ...).
    Other(String),
}

impl ItemStatus {
    /// Parse a backend status string into the closed vocabulary.
    pub fn from_backend(status: &str) -> Self {
        match status {
            "Available" => ItemStatus::Available,
            "Checked out" => ItemStatus::CheckedOut,
            "Unavailable" => ItemStatus::Unavailable,
            "" => ItemStatus::Unknown,
            other => ItemStatus::Other(other.to_string()),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ItemStatus::Available)
    }

    pub fn is_checked_out(&self) -> bool {
        matches!(self, ItemStatus::CheckedOut)
    }

    /// The restriction annotation carried by a CaiaSoft-confirmed status.
    pub fn restriction(&self) -> Option<&str> {
        match self {
            ItemStatus::Restricted(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_display(&self) -> &str {
        match self {
            ItemStatus::Available => "Available",
            ItemStatus::CheckedOut => "Checked out",
            ItemStatus::Unavailable => "Unavailable",
            ItemStatus::Unknown => "",
            ItemStatus::Restricted(text) | ItemStatus::Other(text) => text,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for ItemStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_display())
    }
}

/// Per-record availability, keyed by item id for FOLIO-sourced entries and by
/// barcode for SCSB-sourced entries.  Built per request, never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AvailabilityMap {
    #[serde(flatten)]
    entries: HashMap<String, ItemStatus>,
}

impl AvailabilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, status: ItemStatus) {
        self.entries.insert(key.into(), status);
    }

    pub fn get(&self, key: &str) -> Option<&ItemStatus> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ItemStatus)> {
        self.entries.iter()
    }

    /// How many entries carry exactly the given status.
    pub fn count_of(&self, status: &ItemStatus) -> usize {
        self.entries.values().filter(|s| *s == status).count()
    }
}

impl FromIterator<(String, ItemStatus)> for AvailabilityMap {
    fn from_iter<T: IntoIterator<Item = (String, ItemStatus)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_vocabulary() {
        assert_eq!(ItemStatus::from_backend("Available"), ItemStatus::Available);
        assert_eq!(
            ItemStatus::from_backend("Checked out"),
            ItemStatus::CheckedOut
        );
        assert_eq!(ItemStatus::from_backend(""), ItemStatus::Unknown);
        assert_eq!(
            ItemStatus::from_backend("In transit"),
            ItemStatus::Other("In transit".to_string())
        );
    }

    #[test]
    fn restriction_annotation() {
        let status = ItemStatus::Restricted("Out on Exhibit".to_string());
        assert_eq!(status.restriction(), Some("Out on Exhibit"));
        assert!(!status.is_available());
        assert_eq!(ItemStatus::Available.restriction(), None);
    }

    #[test]
    fn counts_exact_statuses() {
        let map: AvailabilityMap = [
            ("i1".to_string(), ItemStatus::CheckedOut),
            ("i2".to_string(), ItemStatus::Unavailable),
            ("i3".to_string(), ItemStatus::CheckedOut),
        ]
        .into_iter()
        .collect();
        assert_eq!(map.count_of(&ItemStatus::CheckedOut), 2);
        assert_eq!(map.count_of(&ItemStatus::Available), 0);
    }
}
