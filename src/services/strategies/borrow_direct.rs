//! Borrow Direct: bounce to the consortial ReShare search.
//!
//! The query prefers ISSN, then ISBN, then a quoted title (+author).  First
//! match wins; identifiers are never merged.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::models::{BibRecord, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::strategies::{check_permitted_affils, ServiceStrategy};
use crate::services::workflow::RequestParams;

/// OpenURL fields that may carry an ISSN/ISBN, in preference order.
const ISN_PARAM_KEYS: [&str; 4] = ["issn", "rft.issn", "isbn", "rft.isbn"];
/// OpenURL fields that may carry a title, in preference order.
const TITLE_PARAM_KEYS: [&str; 7] = [
    "title",
    "stitle",
    "rft.title",
    "rft.btitle",
    "rft.stitle",
    "rft.jtitle",
    "loantitle",
];

pub struct BorrowDirect {
    definition: ServiceDefinition,
    config: Arc<AppConfig>,
}

impl BorrowDirect {
    pub fn new(definition: ServiceDefinition, config: Arc<AppConfig>) -> Self {
        Self { definition, config }
    }

    /// Fielded query from a bib record: ISSN, else ISBN, else title/author.
    fn query_from_bib_record(record: &BibRecord) -> String {
        if let Some(issn) = record.issns.first() {
            return format!("type=ISN&lookfor={}", issn);
        }
        if let Some(isbn) = record.isbns.first() {
            return format!("type=ISN&lookfor={}", isbn);
        }
        let mut query = format!(
            "type0[]=Title&lookfor0[]=\"{}\"",
            urlencoding::encode(&record.title_brief)
        );
        if !record.author.is_empty() {
            query.push_str(&format!(
                "&type0[]=Author&lookfor0[]=\"{}\"&join=AND",
                urlencoding::encode(&record.author)
            ));
        }
        query
    }

    /// Fielded query from OpenURL parameters.
    fn query_from_openurl(params: &RequestParams) -> Option<String> {
        // ReShare has a single ISBN/ISSN search field, named "ISN".
        if let Some(isn) = ISN_PARAM_KEYS.iter().find_map(|key| params.get(key)) {
            return Some(format!("type=ISN&lookfor={}", isn));
        }

        let title = TITLE_PARAM_KEYS.iter().find_map(|key| params.get(key))?;
        let mut query = format!(
            "type0[]=Title&lookfor0[]=\"{}\"",
            urlencoding::encode(title)
        );
        if let Some(author) = params.get("author") {
            query.push_str(&format!(
                "&type0[]=Author&lookfor0[]=\"{}\"&join=AND",
                urlencoding::encode(author)
            ));
        }
        Some(query)
    }
}

#[async_trait]
impl ServiceStrategy for BorrowDirect {
    async fn patron_eligible(&self, user: &Patron) -> AppResult<()> {
        check_permitted_affils(&self.definition, user)
    }

    async fn service_url(
        &self,
        params: &RequestParams,
        record: Option<&BibRecord>,
        _user: Option<&Patron>,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Option<String>> {
        let reshare_base_url = &self.config.reshare.base_url;

        // (1) Nothing at all: the consortial search page.
        if record.is_none() && params.is_empty() {
            tracing::debug!("borrow_direct: redirect to {}", reshare_base_url);
            return Ok(Some(reshare_base_url.clone()));
        }

        // (2) A bib record: fielded search from its metadata.
        // (3) An OpenURL: fielded search from its parameters.
        let query = match record {
            Some(record) => Some(Self::query_from_bib_record(record)),
            None => Self::query_from_openurl(params),
        };

        // If we failed to build a query...
        let Some(query) = query else {
            return Ok(None);
        };

        Ok(Some(format!(
            "{}/Search/Results?{}",
            reshare_base_url, query
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> BibRecord {
        BibRecord {
            id: "123".to_string(),
            title_brief: "Annals of improbable research".to_string(),
            author: "Abrahams, Marc".to_string(),
            isbns: vec!["9780306406157".to_string()],
            issns: vec!["0003-486X".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn issn_wins_over_isbn_and_title() {
        let query = BorrowDirect::query_from_bib_record(&record());
        assert_eq!(query, "type=ISN&lookfor=0003-486X");
    }

    #[test]
    fn isbn_is_second_preference() {
        let mut record = record();
        record.issns.clear();
        let query = BorrowDirect::query_from_bib_record(&record);
        assert_eq!(query, "type=ISN&lookfor=9780306406157");
    }

    #[test]
    fn title_and_author_are_the_fallback() {
        let mut record = record();
        record.issns.clear();
        record.isbns.clear();
        let query = BorrowDirect::query_from_bib_record(&record);
        assert!(query.starts_with("type0[]=Title&lookfor0[]="));
        assert!(query.contains("type0[]=Author"));
        assert!(query.ends_with("&join=AND"));
    }

    #[test]
    fn openurl_isn_preference_order() {
        let params = RequestParams::from_pairs([
            ("isbn", "9780306406157"),
            ("issn", "0003-486X"),
        ]);
        let query = BorrowDirect::query_from_openurl(&params).unwrap();
        assert_eq!(query, "type=ISN&lookfor=0003-486X");
    }

    #[test]
    fn openurl_without_identifiers_or_title_builds_nothing() {
        let params = RequestParams::from_pairs([("genre", "article")]);
        assert!(BorrowDirect::query_from_openurl(&params).is_none());
    }
}
