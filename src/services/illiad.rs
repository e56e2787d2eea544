//! ILLiad hand-off helpers
//!
//! Parameter sets and URL assembly for the OCLC ILLiad request system.
//! ILLiad form fields are fixed names; the builders here fill them from the
//! bib record and patron.

use std::collections::BTreeMap;

use crate::config::IlliadConfig;
use crate::models::{BibRecord, Patron};

/// Ordered parameter bag; ILLiad URLs are built with sorted keys so they are
/// stable and testable.
pub type IlliadParams = BTreeMap<String, String>;

/// Parameters included with any ILLiad request.
pub fn default_params(
    catalog_base_url: &str,
    user: &Patron,
    record: Option<&BibRecord>,
) -> IlliadParams {
    let mut params = IlliadParams::new();

    // The catalog link lands in the hidden Notes field so the patron
    // cannot edit it.
    if let Some(record) = record {
        params.insert(
            "Notes".to_string(),
            format!("{}/catalog/{}", catalog_base_url, record.id),
        );
    }

    // Patron group / active barcode travel in ItemInfo fields.
    params.insert(
        "ItemInfo2".to_string(),
        user.barcode.clone().unwrap_or_default(),
    );
    params.insert("ItemInfo4".to_string(), user.patron_groups().join(","));

    params
}

/// Params used for the various paging requests.
pub fn paging_params(record: &BibRecord) -> IlliadParams {
    let mut params = IlliadParams::new();
    params.insert("LoanTitle".to_string(), record.title.clone());
    params.insert("LoanAuthor".to_string(), record.author.clone());
    params.insert(
        "ISSN".to_string(),
        record.isbns.first().cloned().unwrap_or_default(),
    );
    params.insert(
        "CallNumber".to_string(),
        record.call_number.clone().unwrap_or_default(),
    );
    params.insert(
        "ESPNumber".to_string(),
        record.oclc_number.clone().unwrap_or_default(),
    );
    params.insert(
        "ItemNumber".to_string(),
        if record.barcodes.len() == 1 {
            record.barcodes[0].clone()
        } else {
            String::new()
        },
    );
    params.insert("LoanEdition".to_string(), record.edition.clone());
    params.insert("LoanPlace".to_string(), record.pub_place.clone());
    params.insert("LoanPublisher".to_string(), record.pub_name.clone());
    params.insert("LoanDate".to_string(), record.pub_date.clone());
    params
}

/// Article-specific params used for the scan requests.
pub fn article_params(record: &BibRecord) -> IlliadParams {
    let mut params = IlliadParams::new();
    params.insert("PhotoJournalTitle".to_string(), record.title.clone());
    params.insert("PhotoArticleAuthor".to_string(), record.author.clone());
    params.insert(
        "ISSN".to_string(),
        record.issns.first().cloned().unwrap_or_default(),
    );
    params.insert(
        "CallNumber".to_string(),
        record.call_number.clone().unwrap_or_default(),
    );
    params.insert(
        "ESPNumber".to_string(),
        record.oclc_number.clone().unwrap_or_default(),
    );
    params
}

/// Book-chapter-specific params used for the scan requests.
pub fn book_chapter_params(record: &BibRecord) -> IlliadParams {
    let mut params = IlliadParams::new();
    params.insert("PhotoJournalTitle".to_string(), record.title.clone());
    params.insert("PhotoItemAuthor".to_string(), record.author.clone());
    params.insert("PhotoItemEdition".to_string(), record.edition.clone());
    params.insert("PhotoItemPlace".to_string(), record.pub_place.clone());
    params.insert("PhotoItemPublisher".to_string(), record.pub_name.clone());
    params.insert("PhotoJournalYear".to_string(), record.pub_date.clone());
    params.insert(
        "ISSN".to_string(),
        record.isbns.first().cloned().unwrap_or_default(),
    );
    params.insert(
        "ESPNumber".to_string(),
        record.oclc_number.clone().unwrap_or_default(),
    );
    params
}

/// Some characters choke ILLiad's form prefill and escaping does not help;
/// strip them from every value.
pub fn clean_params(params: &mut IlliadParams) {
    for value in params.values_mut() {
        value.retain(|c| !matches!(c, '<' | '>' | '&' | '%' | '#'));
    }
}

/// Serialize params as a query string with sorted keys.
pub fn to_query(params: &IlliadParams) -> String {
    params
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Patrons always reach ILLiad through the library EZproxy.
pub fn build_full_url(config: &IlliadConfig, illiad_url: &str, params: &IlliadParams) -> String {
    let illiad_url_with_params = format!("{}?{}", illiad_url, to_query(params));
    format!(
        "{}?url={}",
        config.ezproxy_login_url,
        urlencoding::encode(&illiad_url_with_params)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record() -> BibRecord {
        BibRecord {
            id: "123".to_string(),
            title: "The essence of totalitarianism".to_string(),
            author: "Smith, John".to_string(),
            barcodes: vec!["CU0001".to_string()],
            ..Default::default()
        }
    }

    fn test_patron() -> Patron {
        Patron {
            uni: "ab1234".to_string(),
            email: "ab1234@valence-lib.org".to_string(),
            barcode: Some("987654".to_string()),
            affils: vec!["LIB_role-circ-GRD".to_string()],
        }
    }

    #[test]
    fn default_params_carry_catalog_link_and_patron_fields() {
        let record = test_record();
        let params = default_params("https://catalog.example.org", &test_patron(), Some(&record));
        assert_eq!(
            params.get("Notes").map(String::as_str),
            Some("https://catalog.example.org/catalog/123")
        );
        assert_eq!(params.get("ItemInfo2").map(String::as_str), Some("987654"));
        assert_eq!(params.get("ItemInfo4").map(String::as_str), Some("GRD"));
    }

    #[test]
    fn single_barcode_is_passed_as_item_number() {
        let params = paging_params(&test_record());
        assert_eq!(params.get("ItemNumber").map(String::as_str), Some("CU0001"));

        let mut multi = test_record();
        multi.barcodes.push("CU0002".to_string());
        let params = paging_params(&multi);
        assert_eq!(params.get("ItemNumber").map(String::as_str), Some(""));
    }

    #[test]
    fn clean_params_strips_problem_characters() {
        let mut params = IlliadParams::new();
        params.insert("LoanTitle".to_string(), "Ions & isotopes <3 #5 100%".to_string());
        clean_params(&mut params);
        assert_eq!(
            params.get("LoanTitle").map(String::as_str),
            Some("Ions  isotopes 3 5 100")
        );
    }

    #[test]
    fn full_url_is_proxied() {
        let config = IlliadConfig {
            base_url: "https://illiad.example.org/zcu".to_string(),
            base_url_zch: "https://illiad.example.org/zch".to_string(),
            login_url: "https://illiad.example.org/logon.html".to_string(),
            ezproxy_login_url: "https://ezproxy.example.org/login".to_string(),
            tc_ill_url: "https://resolver.example.org/tc-ill".to_string(),
            tc_services_url: "https://library.tc.example.org/services".to_string(),
        };
        let mut params = IlliadParams::new();
        params.insert("Form".to_string(), "20".to_string());
        let url = build_full_url(&config, &config.base_url, &params);
        assert!(url.starts_with("https://ezproxy.example.org/login?url="));
        assert!(url.contains("Form%3D20"));
    }
}
