//! MARC to bib-record translator
//!
//! Drills a parsed MARC record down into the holdings/items graph and computes
//! every derived scalar field.  All text projections go through
//! [`text::trim_punctuation`], implemented once.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use super::parser::MarcRecord;
use super::text;
use crate::error::{AppError, AppResult};
use crate::models::bib::{BibRecord, Holding, Institution, Item};

/// Extracts the call-number portion of a 992 $b local field.
static CALL_NUMBER_992: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.* >> (.*)\|DELIM\|.*").expect("valid regex"));
static OCLC_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"OCoLC[^0-9A-Za-z]*([0-9A-Za-z]+)").expect("valid regex"));
static YEAR_008: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9u]{4}$").expect("valid regex"));

/// Holding definition fields (852) and the note fields attached by $0.
const HOLDING_TAG: &str = "852";
const ITEM_TAG: &str = "876";
const MFHD_NOTE_TAGS: [&str; 9] = [
    "866", "867", "868", "890", "891", "892", "893", "894", "895",
];

/// MARC record translator
pub struct BibTranslator {
    finding_aid_hosts: Vec<String>,
}

impl BibTranslator {
    pub fn new(finding_aid_hosts: Vec<String>) -> Self {
        Self { finding_aid_hosts }
    }

    /// Translate a parsed MARC record into the immutable bib graph.
    pub fn translate(&self, marc: &MarcRecord) -> AppResult<BibRecord> {
        let id = marc
            .control_field("001")
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::NotFound("bibliographic record has no control number".to_string())
            })?;

        let holdings = build_holdings(marc, bib_call_number(marc));
        let institution = holdings
            .first()
            .map(|h| Institution::from_location_code(&h.location_code))
            .unwrap_or(Institution::Cul);

        // Shared-collection records carry the partner's own bib id in 009.
        let owning_institution_bib_id = match institution {
            Institution::Cul => id.clone(),
            _ => marc.control_field("009").unwrap_or(&id).to_string(),
        };

        let barcodes = collect_barcodes(&holdings);

        Ok(BibRecord {
            title: title(marc),
            title_brief: title_brief(marc),
            author: author(marc),
            publisher: publisher(marc),
            pub_place: pub_subfield(marc, 'a'),
            pub_name: pub_subfield(marc, 'b'),
            pub_date: pub_subfield(marc, 'c'),
            edition: edition(marc),
            call_number: bib_call_number(marc),
            oclc_number: oclc_number(marc),
            isbns: isbns(marc),
            issns: issns(marc),
            finding_aid_url: self.finding_aid_url(marc),
            aeon_dates: aeon_dates(marc),
            aeon_format: aeon_format(marc),
            access_restriction: access_restriction(marc),
            id,
            institution,
            owning_institution_bib_id,
            holdings,
            barcodes,
        })
    }

    /// Finding-aid links live in 856 $u; they must point at a configured
    /// finding-aid host and must not be a downloadable document.
    fn finding_aid_url(&self, marc: &MarcRecord) -> Option<String> {
        for field in marc.fields("856") {
            let Some(url) = field.subfield('u') else {
                continue;
            };
            if !self.finding_aid_hosts.iter().any(|host| url.contains(host)) {
                continue;
            }
            if ["pdf", "doc", "htm", "html"]
                .iter()
                .any(|ext| url.ends_with(ext))
            {
                continue;
            }
            return Some(url.to_string());
        }
        None
    }
}

/// Process each 852 into a holding, then attach note fields and items by
/// their embedded holding id.  Entries referencing an unknown holding id are
/// dropped, not errors - the corpus has them.
fn build_holdings(marc: &MarcRecord, bib_call_number: Option<String>) -> Vec<Holding> {
    let mut holdings: Vec<Holding> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for field in marc.fields(HOLDING_TAG) {
        let Some(mfhd_id) = field.subfield('0') else {
            tracing::debug!("852 without $0 holding id dropped");
            continue;
        };
        // Holdings call number, if present, takes precedence over bib-level.
        let display_call_number = field
            .subfield('h')
            .filter(|v| !v.is_empty())
            .map(|v| text::trim_punctuation(v))
            .or_else(|| bib_call_number.clone());

        index.insert(mfhd_id.to_string(), holdings.len());
        holdings.push(Holding {
            mfhd_id: mfhd_id.to_string(),
            location_display: field.subfield('a').unwrap_or_default().to_string(),
            location_code: field.subfield('b').unwrap_or_default().to_string(),
            display_call_number,
            ..Default::default()
        });
    }

    for tag in MFHD_NOTE_TAGS {
        for field in marc.fields(tag) {
            let (Some(mfhd_id), Some(value)) = (field.subfield('0'), field.subfield('a')) else {
                continue;
            };
            let Some(&slot) = index.get(mfhd_id) else {
                tracing::debug!("{} references unknown holding {}, dropped", tag, mfhd_id);
                continue;
            };
            if let Some(list) = note_list(&mut holdings[slot], tag) {
                list.push(value.to_string());
            }
        }
    }

    for field in marc.fields(ITEM_TAG) {
        let Some(mfhd_id) = field.subfield('0') else {
            continue;
        };
        let Some(&slot) = index.get(mfhd_id) else {
            tracing::debug!("876 references unknown holding {}, dropped", mfhd_id);
            continue;
        };
        let holding = &mut holdings[slot];

        holding.items.push(Item {
            item_id: field.subfield('a').unwrap_or_default().to_string(),
            barcode: field.subfield('p').unwrap_or_default().to_string(),
            blind_barcode: field.subfield('x').map(str::to_string),
            enum_chron: field.subfield('3').map(str::to_string),
            use_restriction: field.subfield('h').map(str::to_string),
            temporary_location: field.subfield('l').map(str::to_string),
        });

        // At most one customer code per holding: first non-empty value wins,
        // conflicting later values are dropped.
        if let Some(code) = field.subfield('z').filter(|v| !v.is_empty()) {
            match &holding.customer_code {
                None => holding.customer_code = Some(code.to_string()),
                Some(existing) if existing != code => {
                    tracing::warn!(
                        "holding {} has conflicting customer codes {} and {}, keeping {}",
                        mfhd_id,
                        existing,
                        code,
                        existing
                    );
                }
                Some(_) => {}
            }
        }
    }

    holdings
}

fn note_list<'a>(holding: &'a mut Holding, tag: &str) -> Option<&'a mut Vec<String>> {
    match tag {
        "866" => Some(&mut holding.summary_holdings),
        "867" => Some(&mut holding.supplements),
        "868" => Some(&mut holding.indexes),
        "890" => Some(&mut holding.public_notes),
        "891" => Some(&mut holding.donor_information),
        "892" => Some(&mut holding.reproduction_notes),
        "893" => Some(&mut holding.urls),
        "894" => Some(&mut holding.acquisitions_information),
        "895" => Some(&mut holding.current_issues),
        _ => None,
    }
}

/// Single array of barcodes from all holdings, all items, de-duplicated.
fn collect_barcodes(holdings: &[Holding]) -> Vec<String> {
    let mut seen = HashMap::new();
    let mut barcodes = Vec::new();
    for holding in holdings {
        for item in &holding.items {
            if item.barcode.is_empty() {
                continue;
            }
            if seen.insert(item.barcode.clone(), ()).is_none() {
                barcodes.push(item.barcode.clone());
            }
        }
    }
    barcodes
}

fn title(marc: &MarcRecord) -> String {
    let Some(field) = marc.first_field("245") else {
        return String::new();
    };
    let a = field.subfield('a').unwrap_or_default().trim();
    let b = field.subfield('b').unwrap_or_default().trim();
    let title = if b.is_empty() {
        a.to_string()
    } else {
        format!("{} {}", a, b)
    };
    text::trim_punctuation(&title)
}

/// Title proper only (245 $a), for fielded external searches.
fn title_brief(marc: &MarcRecord) -> String {
    let Some(field) = marc.first_field("245") else {
        return String::new();
    };
    text::trim_punctuation(field.subfield('a').unwrap_or_default().trim())
}

fn author(marc: &MarcRecord) -> String {
    // First author field wins; gather a few subfields from it.
    for tag in ["100", "110", "111"] {
        if let Some(field) = marc.first_field(tag) {
            let author = field.joined_subfields("abcj");
            return text::trim_punctuation(&author);
        }
    }
    String::new()
}

fn publisher(marc: &MarcRecord) -> String {
    for tag in ["260", "264"] {
        if let Some(field) = marc.first_field(tag) {
            return text::trim_punctuation(&field.joined_subfields("abcefg3"));
        }
    }
    String::new()
}

/// Publication place/name/date come from whichever of 260/264 appears first.
fn pub_subfield(marc: &MarcRecord, code: char) -> String {
    let field = marc.first_field("260").or_else(|| marc.first_field("264"));
    let Some(value) = field.and_then(|f| f.subfield(code)) else {
        return String::new();
    };
    text::trim_punctuation(value)
}

fn edition(marc: &MarcRecord) -> String {
    let Some(field) = marc.first_field("250") else {
        return String::new();
    };
    text::trim_punctuation(&field.joined_subfields("ab"))
}

/// Call number: local 992 field first, falling back to 050.
fn bib_call_number(marc: &MarcRecord) -> Option<String> {
    if let Some(value) = marc.subfield("992", 'b') {
        if let Some(caps) = CALL_NUMBER_992.captures(value) {
            let call_number = text::trim_punctuation(&caps[1]);
            if !call_number.is_empty() {
                return Some(call_number);
            }
        }
    }

    let field = marc.first_field("050")?;
    let joined = field
        .subfields
        .iter()
        .map(|sf| sf.data.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let call_number = text::trim_punctuation(&joined);
    (!call_number.is_empty()).then_some(call_number)
}

/// 035 - System Control Number; may be OCLC or something else.
fn oclc_number(marc: &MarcRecord) -> Option<String> {
    for field in marc.fields("035") {
        let Some(number) = field.subfield('a') else {
            continue;
        };
        if let Some(caps) = OCLC_NUMBER.captures(number) {
            return Some(caps[1].to_string());
        }
    }
    None
}

fn isbns(marc: &MarcRecord) -> Vec<String> {
    marc.fields("020")
        .filter_map(|f| f.subfield('a'))
        .filter_map(text::normalize_isbn)
        .collect()
}

fn issns(marc: &MarcRecord) -> Vec<String> {
    marc.fields("022")
        .filter_map(|f| f.subfield('a'))
        .filter_map(text::normalize_issn)
        .collect()
}

/// Date range for reading-room requests, from 008 positions 7-10 / 11-14.
fn aeon_dates(marc: &MarcRecord) -> Option<String> {
    let data = marc.control_field("008")?;
    let start_year = data.get(7..11)?;
    if !YEAR_008.is_match(start_year) {
        return None;
    }
    match data.get(11..15) {
        Some(end_year) if YEAR_008.is_match(end_year) && end_year != "9999" => {
            Some(format!("{} {}", start_year, end_year))
        }
        _ => Some(start_year.to_string()),
    }
}

/// 506 - Restrictions on Access Note.
fn access_restriction(marc: &MarcRecord) -> Option<String> {
    for field in marc.fields("506") {
        if let Some(restriction) = field.subfield('a') {
            if restriction.to_lowercase().contains("unprocessed") {
                return Some("UNPROCESSED".to_string());
            }
        }
    }
    None
}

const FORMAT_008_CODES: [(char, &str); 9] = [
    ('a', "Microfilm"),
    ('b', "Microfiche"),
    ('c', "Microopaque"),
    ('d', "Large print"),
    ('f', "Braille"),
    ('o', "Online"),
    ('q', "Direct electronic"),
    ('r', "Print reproduction"),
    ('s', "Electronic"),
];

/// Material format for reading-room requests, from leader positions 6-7 plus
/// an 008 modifier code.
fn aeon_format(marc: &MarcRecord) -> Option<String> {
    let mut leader_chars = marc.leader.chars().skip(6);
    let c6 = leader_chars.next()?;
    let c7 = leader_chars.next().unwrap_or(' ');

    let (category, position_008) = match (c6, c7) {
        ('a', 'm') | ('a', 'a') | ('a', 'c') | ('a', 'd') => ("Book", Some(23)),
        ('a', 's') | ('a', 'i') | ('a', 'b') => ("Continuing Resource", Some(23)),
        ('h', _) | ('t', _) => ("Book", Some(23)),
        ('m', _) => ("Computer File", Some(23)),
        ('g', _) | ('k', _) | ('o', _) | ('r', _) => ("Visual Material", Some(29)),
        ('c', _) | ('d', _) => ("Score", Some(23)),
        ('i', _) | ('j', _) => ("Recording", Some(23)),
        ('e', _) | ('f', _) => ("Map", Some(29)),
        ('b', _) | ('p', _) => ("Mixed", Some(23)),
        _ => return None,
    };

    let modifier = position_008
        .and_then(|pos| marc.control_field("008").and_then(|data| data.chars().nth(pos)))
        .and_then(|code| {
            FORMAT_008_CODES
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, label)| *label)
        });

    match modifier {
        Some(label) => Some(format!("{}; {}", category, label)),
        None => Some(category.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marc::parser::{DataField, Subfield};

    fn field(tag: &str, subfields: &[(char, &str)]) -> DataField {
        DataField {
            tag: tag.to_string(),
            ind1: ' ',
            ind2: ' ',
            subfields: subfields
                .iter()
                .map(|(code, data)| Subfield {
                    code: *code,
                    data: data.to_string(),
                })
                .collect(),
        }
    }

    fn marc_with(control: &[(&str, &str)], fields: Vec<DataField>) -> MarcRecord {
        MarcRecord {
            leader: "00000nam a2200000   4500".to_string(),
            control_fields: control
                .iter()
                .map(|(tag, value)| (tag.to_string(), value.to_string()))
                .collect(),
            data_fields: fields,
        }
    }

    fn translator() -> BibTranslator {
        BibTranslator::new(vec!["findingaids.library.valence-lib.org".to_string()])
    }

    #[test]
    fn groups_items_under_their_holdings() {
        let marc = marc_with(
            &[("001", "123")],
            vec![
                field("852", &[('0', "h1"), ('a', "Milstein"), ('b', "glx")]),
                field("852", &[('0', "h2"), ('a', "Offsite"), ('b', "off,glx")]),
                field("876", &[('0', "h1"), ('a', "i1"), ('p', "CU0001")]),
                field("876", &[('0', "h1"), ('a', "i2"), ('p', "CU0002")]),
                field("876", &[('0', "h2"), ('a', "i3"), ('p', "CU0003")]),
                // References an unknown holding: dropped, not an error
                field("876", &[('0', "h9"), ('a', "i4"), ('p', "CU0004")]),
            ],
        );
        let record = translator().translate(&marc).unwrap();

        assert_eq!(record.holdings.len(), 2);
        let total_items: usize = record.holdings.iter().map(|h| h.items.len()).sum();
        assert_eq!(total_items, 3);
        assert_eq!(record.holdings[0].items.len(), 2);
        assert_eq!(record.holdings[1].items.len(), 1);
        assert_eq!(record.barcodes, vec!["CU0001", "CU0002", "CU0003"]);
    }

    #[test]
    fn note_fields_attach_by_holding_id() {
        let marc = marc_with(
            &[("001", "123")],
            vec![
                field("852", &[('0', "h1"), ('b', "glx")]),
                field("866", &[('0', "h1"), ('a', "v.1-10")]),
                field("866", &[('0', "h1"), ('a', "v.11-20")]),
                field("866", &[('0', "h9"), ('a', "orphaned")]),
                field("894", &[('0', "h1"), ('a', "On order")]),
            ],
        );
        let record = translator().translate(&marc).unwrap();
        let holding = &record.holdings[0];
        assert_eq!(holding.summary_holdings, vec!["v.1-10", "v.11-20"]);
        assert_eq!(holding.acquisitions_information, vec!["On order"]);
    }

    #[test]
    fn holding_call_number_overrides_bib_level() {
        let marc = marc_with(
            &[("001", "123")],
            vec![
                field("050", &[('a', "QA1"), ('b', ".A6")]),
                field("852", &[('0', "h1"), ('b', "glx"), ('h', "QA2 .B7")]),
                field("852", &[('0', "h2"), ('b', "mil")]),
            ],
        );
        let record = translator().translate(&marc).unwrap();
        assert_eq!(record.holdings[0].display_call_number.as_deref(), Some("QA2 .B7"));
        assert_eq!(record.holdings[1].display_call_number.as_deref(), Some("QA1 .A6"));
    }

    #[test]
    fn customer_code_first_value_wins() {
        let marc = marc_with(
            &[("001", "123")],
            vec![
                field("852", &[('0', "h1"), ('b', "off,glx")]),
                field("876", &[('0', "h1"), ('a', "i1"), ('p', "CU1"), ('z', "PA")]),
                field("876", &[('0', "h1"), ('a', "i2"), ('p', "CU2"), ('z', "PB")]),
            ],
        );
        let record = translator().translate(&marc).unwrap();
        assert_eq!(record.holdings[0].customer_code.as_deref(), Some("PA"));
    }

    #[test]
    fn institution_inferred_from_first_holding() {
        let marc = marc_with(
            &[("001", "SCSB-55"), ("009", "998877")],
            vec![field("852", &[('0', "h1"), ('b', "scsb-nypl")])],
        );
        let record = translator().translate(&marc).unwrap();
        assert_eq!(record.institution, Institution::Nypl);
        assert_eq!(record.owning_institution_bib_id, "998877");
    }

    #[test]
    fn derived_fields_are_trimmed() {
        let marc = marc_with(
            &[("001", "123")],
            vec![
                field("245", &[('a', "The essence of totalitarianism :"), ('b', "a study /")]),
                field("100", &[('a', "Smith, John,")]),
                field("260", &[('a', "[New York] :"), ('b', "Knopf,"), ('c', "1955.")]),
            ],
        );
        let record = translator().translate(&marc).unwrap();
        assert_eq!(record.title, "The essence of totalitarianism : a study");
        assert_eq!(record.title_brief, "The essence of totalitarianism");
        assert_eq!(record.author, "Smith, John");
        assert_eq!(record.pub_place, "New York");
        assert_eq!(record.pub_name, "Knopf");
        assert_eq!(record.pub_date, "1955");
    }

    #[test]
    fn derived_fields_are_idempotent_projections() {
        let marc = marc_with(
            &[("001", "123")],
            vec![field("245", &[('a', "Annals of mathematics.")])],
        );
        let first = translator().translate(&marc).unwrap();
        let second = translator().translate(&marc).unwrap();
        assert_eq!(first.title, second.title);
        assert_eq!(
            text::trim_punctuation(&first.title),
            first.title,
            "derived field must already be fully trimmed"
        );
    }

    #[test]
    fn identifiers_prefer_valid_forms() {
        let marc = marc_with(
            &[("001", "123")],
            vec![
                field("020", &[('a', "9780306406157 (hardcover)")]),
                field("020", &[('a', "invalid")]),
                field("022", &[('a', "0003486X")]),
                field("035", &[('a', "(OCoLC)ocm12345678")]),
            ],
        );
        let record = translator().translate(&marc).unwrap();
        assert_eq!(record.isbns, vec!["9780306406157"]);
        assert_eq!(record.issns, vec!["0003-486X"]);
        assert_eq!(record.oclc_number.as_deref(), Some("ocm12345678"));
    }

    #[test]
    fn finding_aid_links_filter_hosts_and_documents() {
        let marc = marc_with(
            &[("001", "123")],
            vec![
                field("856", &[('u', "https://example.org/other")]),
                field(
                    "856",
                    &[('u', "https://findingaids.library.valence-lib.org/ead/x.pdf")],
                ),
                field(
                    "856",
                    &[('u', "https://findingaids.library.valence-lib.org/ead/ldpd_4079355")],
                ),
            ],
        );
        let record = translator().translate(&marc).unwrap();
        assert_eq!(
            record.finding_aid_url.as_deref(),
            Some("https://findingaids.library.valence-lib.org/ead/ldpd_4079355")
        );
    }

    #[test]
    fn aeon_date_range_from_008() {
        let marc = marc_with(
            &[("001", "1"), ("008", "850101m19551960nyu           000 0 eng  ")],
            vec![],
        );
        assert_eq!(aeon_dates(&marc).as_deref(), Some("1955 1960"));

        let open_ended = marc_with(
            &[("001", "1"), ("008", "850101m19559999nyu           000 0 eng  ")],
            vec![],
        );
        assert_eq!(aeon_dates(&open_ended).as_deref(), Some("1955"));
    }
}
