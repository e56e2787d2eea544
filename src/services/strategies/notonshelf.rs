//! Not-on-shelf reports: the catalog says a book is on the shelf, the shelf
//! disagrees.  Routed to the owning location's circulation staff.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::models::bib::Holding;
use crate::models::{BibRecord, Patron, ServiceDefinition};
use crate::services::availability::AvailabilityResolver;
use crate::services::email::Mailer;
use crate::services::strategies::ServiceStrategy;
use crate::services::workflow::RequestParams;

/// Location-code prefixes to circulation aliases.  First match wins.
const LOCATION_EMAIL_RULES: [(&[&str], &str); 12] = [
    (&["bar,mil"], "butler_circulation@libraries.valence-lib.org"),
    (
        &["bwc", "bar", "bdc", "bdg"],
        "barnard_circulation@libraries.valence-lib.org",
    ),
    (&["ref"], "reference_circulation@libraries.valence-lib.org"),
    (
        &["asx", "docs", "dsc", "leh", "les", "lsp", "lsw", "map"],
        "lehman_circulation@libraries.valence-lib.org",
    ),
    (
        &["bsc", "bsr", "bus"],
        "business_circulation@libraries.valence-lib.org",
    ),
    (
        &["eal", "ean", "ear", "eax"],
        "east_asian_circulation@libraries.valence-lib.org",
    ),
    (
        &["jazz", "msa", "msc", "msr", "mus", "mvr"],
        "music_circulation@libraries.valence-lib.org",
    ),
    (
        &["hmc", "hml", "hsl", "hsx", "orth"],
        "health_sciences_circulation@libraries.valence-lib.org",
    ),
    (&["psy"], "psychology_circulation@libraries.valence-lib.org"),
    (
        &["mat", "sci", "phy", "che", "bio"],
        "science_circulation@libraries.valence-lib.org",
    ),
    (&["jou"], "journalism_circulation@libraries.valence-lib.org"),
    (
        &["ava", "avda", "ave", "avr", "faa", "far", "fax", "war"],
        "avery_circulation@libraries.valence-lib.org",
    ),
];

const DEFAULT_CIRCULATION_EMAIL: &str = "butler_circulation@libraries.valence-lib.org";

pub struct NotOnShelf {
    definition: ServiceDefinition,
}

impl NotOnShelf {
    pub fn new(definition: ServiceDefinition) -> Self {
        Self { definition }
    }

    /// Circulation alias responsible for a location code.  The offsite
    /// prefix is stripped first so "off,eal" routes like "eal".
    fn email_alias_for_location(location_code: &str) -> &'static str {
        let bare = location_code.strip_prefix("off,").unwrap_or(location_code);
        for (prefixes, alias) in LOCATION_EMAIL_RULES {
            if prefixes.iter().any(|prefix| bare.starts_with(prefix)) {
                return alias;
            }
        }
        DEFAULT_CIRCULATION_EMAIL
    }

    fn report_locals(
        &self,
        params: &RequestParams,
        record: &BibRecord,
        user: Option<&Patron>,
    ) -> (Option<Value>, &'static str) {
        // Which holding (location) has the missing book?
        let holding = params.get("mfhd_id").and_then(|id| record.holding(id));
        let staff_email = holding
            .map(|h| Self::email_alias_for_location(&h.location_code))
            .unwrap_or(DEFAULT_CIRCULATION_EMAIL);
        let locals = holding.map(|h| {
            json!({
                "record": record,
                "location_display": h.location_display,
                "location_code": h.location_code,
                "staff_email": staff_email,
                "note": params.get("note"),
                "patron_uni": user.map(|u| u.uni.clone()),
                "patron_email": user.map(|u| u.email.clone()),
            })
        });
        (locals, staff_email)
    }
}

#[async_trait]
impl ServiceStrategy for NotOnShelf {
    async fn form_locals(
        &self,
        _params: &RequestParams,
        record: Option<&BibRecord>,
        _user: Option<&Patron>,
        _resolver: &AvailabilityResolver,
    ) -> AppResult<Value> {
        let holdings: Option<Vec<&Holding>> = record.map(|record| {
            let mut holdings: Vec<&Holding> = record.holdings.iter().collect();
            holdings.sort_by(|a, b| a.location_display.cmp(&b.location_display));
            holdings
        });
        Ok(json!({
            "record": record,
            "holdings": holdings,
        }))
    }

    async fn send_emails(
        &self,
        mailer: &Mailer,
        params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        _submission: &Value,
    ) -> AppResult<()> {
        let Some(record) = record else {
            return Ok(());
        };
        let (locals, staff_email) = self.report_locals(params, record, user);
        let Some(locals) = locals else {
            return Ok(());
        };
        let body = format!(
            "A patron reports this item missing from the shelf:\n\n\
             Title:    {}\nRecord:   {}\nLocation: {} ({})\nNote:     {}\n\n\
             Reported by {}",
            record.title,
            record.id,
            locals["location_display"].as_str().unwrap_or(""),
            locals["location_code"].as_str().unwrap_or(""),
            params.get("note").unwrap_or(""),
            user.map(|u| u.email.as_str()).unwrap_or(""),
        );
        mailer
            .send(staff_email, &format!("New {}", self.definition.label), &body)
            .await
    }

    async fn confirmation_locals(
        &self,
        params: &RequestParams,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        _submission: &Value,
    ) -> AppResult<Value> {
        let Some(record) = record else {
            return Ok(json!({}));
        };
        let (locals, _) = self.report_locals(params, record, user);
        Ok(locals.unwrap_or_else(|| json!({ "record": record })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_rules_route_by_prefix() {
        assert_eq!(
            NotOnShelf::email_alias_for_location("eal"),
            "east_asian_circulation@libraries.valence-lib.org"
        );
        assert_eq!(
            NotOnShelf::email_alias_for_location("off,eal"),
            "east_asian_circulation@libraries.valence-lib.org"
        );
        // "bar,mil" must win over the broader "bar" rule
        assert_eq!(
            NotOnShelf::email_alias_for_location("bar,mil"),
            "butler_circulation@libraries.valence-lib.org"
        );
        assert_eq!(
            NotOnShelf::email_alias_for_location("bar,stor"),
            "barnard_circulation@libraries.valence-lib.org"
        );
        // Unmapped locations land at the default desk
        assert_eq!(
            NotOnShelf::email_alias_for_location("zzz"),
            DEFAULT_CIRCULATION_EMAIL
        );
    }
}
