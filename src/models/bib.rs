//! Bibliographic record, holding and item models.
//!
//! The graph is immutable once built: derived descriptive fields are pure
//! projections computed by the translator, and availability never writes back
//! into it.

use serde::Serialize;

/// Owning institution, inferred from the first holding's location code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Institution {
    Cul,
    Pul,
    Nypl,
    Hl,
}

impl Institution {
    pub fn from_location_code(code: &str) -> Self {
        match code {
            "scsb-nypl" | "scsbnypl" => Institution::Nypl,
            "scsb-pul" | "scsbpul" => Institution::Pul,
            "scsbhl" => Institution::Hl,
            _ => Institution::Cul,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Institution::Cul => "CUL",
            Institution::Pul => "PUL",
            Institution::Nypl => "NYPL",
            Institution::Hl => "HL",
        }
    }
}

impl std::fmt::Display for Institution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A location code is offsite iff it starts with "off" or "scsb",
/// case-insensitively.  Pure function of the code.
pub fn is_offsite_location_code(code: &str) -> bool {
    let code = code.to_lowercase();
    code.starts_with("off") || code.starts_with("scsb")
}

/// A single physical copy within a holding.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Item {
    pub item_id: String,
    /// May be empty for blind-barcode items.
    pub barcode: String,
    pub blind_barcode: Option<String>,
    pub enum_chron: Option<String>,
    pub use_restriction: Option<String>,
    pub temporary_location: Option<String>,
}

/// A physical-location grouping of items (MFHD) within a bib record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Holding {
    pub mfhd_id: String,
    pub location_code: String,
    pub location_display: String,
    /// Holding-level call number, falling back to the bib-level one.
    pub display_call_number: Option<String>,
    /// ReCAP partner routing code, at most one per holding.
    pub customer_code: Option<String>,
    pub summary_holdings: Vec<String>,
    pub supplements: Vec<String>,
    pub indexes: Vec<String>,
    pub public_notes: Vec<String>,
    pub donor_information: Vec<String>,
    pub reproduction_notes: Vec<String>,
    pub urls: Vec<String>,
    pub acquisitions_information: Vec<String>,
    pub current_issues: Vec<String>,
    pub items: Vec<Item>,
}

impl Holding {
    pub fn is_offsite(&self) -> bool {
        is_offsite_location_code(&self.location_code)
    }
}

/// A catalog record with its holdings/items graph and derived scalar fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BibRecord {
    pub id: String,
    #[serde(serialize_with = "serialize_institution")]
    pub institution: Institution,
    /// The bib id in the owning institution's own system: the local id for
    /// local records, the partner id (009) for shared-collection records.
    pub owning_institution_bib_id: String,
    pub title: String,
    /// Title proper only (245 $a), for fielded searches.
    pub title_brief: String,
    pub author: String,
    pub publisher: String,
    pub pub_place: String,
    pub pub_name: String,
    pub pub_date: String,
    pub edition: String,
    pub call_number: Option<String>,
    pub oclc_number: Option<String>,
    pub isbns: Vec<String>,
    pub issns: Vec<String>,
    pub finding_aid_url: Option<String>,
    /// Special-collections projections
    pub aeon_dates: Option<String>,
    pub aeon_format: Option<String>,
    pub access_restriction: Option<String>,
    pub holdings: Vec<Holding>,
    /// Every item barcode across all holdings, de-duplicated, in order.
    pub barcodes: Vec<String>,
}

fn serialize_institution<S: serde::Serializer>(
    inst: &Institution,
    ser: S,
) -> Result<S::Ok, S::Error> {
    ser.serialize_str(inst.as_str())
}

impl Default for Institution {
    fn default() -> Self {
        Institution::Cul
    }
}

impl BibRecord {
    pub fn offsite_holdings(&self) -> Vec<&Holding> {
        self.holdings.iter().filter(|h| h.is_offsite()).collect()
    }

    pub fn onsite_holdings(&self) -> Vec<&Holding> {
        self.holdings.iter().filter(|h| !h.is_offsite()).collect()
    }

    pub fn holding(&self, mfhd_id: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.mfhd_id == mfhd_id)
    }

    /// The holding that contains an item with the given barcode.
    pub fn holding_for_barcode(&self, barcode: &str) -> Option<&Holding> {
        self.holdings
            .iter()
            .find(|h| h.items.iter().any(|i| i.barcode == barcode))
    }

    /// Title + author in a single string, as shared-collection APIs expect.
    pub fn title_identifier(&self) -> String {
        format!("{} / {}", self.title, self.author)
    }

    /// Basic bib fields attached to every request audit row.
    pub fn log_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "bib_id": self.id,
            "title": self.title,
            "author": self.author,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsite_classification_is_case_insensitive() {
        assert!(is_offsite_location_code("off,rcp1"));
        assert!(is_offsite_location_code("OFF,glg"));
        assert!(is_offsite_location_code("scsb-nypl"));
        assert!(is_offsite_location_code("SCSBHL"));
        assert!(!is_offsite_location_code("bar,stor"));
        assert!(!is_offsite_location_code("glx"));
        assert!(!is_offsite_location_code(""));
    }

    #[test]
    fn institution_from_location_code() {
        assert_eq!(
            Institution::from_location_code("scsb-nypl"),
            Institution::Nypl
        );
        assert_eq!(
            Institution::from_location_code("scsbpul"),
            Institution::Pul
        );
        assert_eq!(Institution::from_location_code("scsbhl"), Institution::Hl);
        assert_eq!(Institution::from_location_code("glx"), Institution::Cul);
    }

    #[test]
    fn holding_lookup_by_barcode() {
        let record = BibRecord {
            holdings: vec![
                Holding {
                    mfhd_id: "h1".into(),
                    items: vec![Item {
                        item_id: "i1".into(),
                        barcode: "CU0001".into(),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                Holding {
                    mfhd_id: "h2".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            record.holding_for_barcode("CU0001").map(|h| h.mfhd_id.as_str()),
            Some("h1")
        );
        assert!(record.holding_for_barcode("CU9999").is_none());
    }
}
