//! Patron model
//!
//! Identity arrives pre-authenticated from the SSO layer; this model carries
//! the attributes eligibility decisions run on.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static PATRON_GROUP_AFFIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^LIB_role-circ-([A-Z]+)$").expect("valid regex"));
static BLOCKED_AFFIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^LIB_role-circ-.*-blocked$").expect("valid regex"));

/// Patron group barred from electronic document delivery.
const EDD_DENIED_GROUP: &str = "RECAP";

#[derive(Debug, Clone, Default, Serialize)]
pub struct Patron {
    /// University network id, without any mail-domain suffix.
    pub uni: String,
    pub email: String,
    /// Circulation barcode, resolved through the configured ILS; may be
    /// absent when the lookup failed.
    pub barcode: Option<String>,
    /// Directory affiliations, as delivered by the identity provider.
    pub affils: Vec<String>,
}

impl Patron {
    pub fn new(uni: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uni: uni.into(),
            email: email.into(),
            barcode: None,
            affils: Vec::new(),
        }
    }

    pub fn has_affil(&self, affil: &str) -> bool {
        !affil.is_empty() && self.affils.iter().any(|a| a == affil)
    }

    /// Circulation patron groups carried in the affiliation set.
    pub fn patron_groups(&self) -> Vec<String> {
        self.affils
            .iter()
            .filter_map(|affil| {
                PATRON_GROUP_AFFIL
                    .captures(affil)
                    .map(|caps| caps[1].to_string())
            })
            .collect()
    }

    /// Generic permit/deny affiliation check.  Denied affiliations reject
    /// immediately; otherwise any permitted affiliation grants access.  An
    /// empty permitted list grants nothing.
    pub fn affils_permit(&self, permitted: &[String], denied: &[String]) -> bool {
        if self.affils.is_empty() {
            return false;
        }
        if denied.iter().any(|bad| self.has_affil(bad)) {
            tracing::debug!("{} carries a denied affiliation", self.uni);
            return false;
        }
        permitted.iter().any(|good| self.has_affil(good))
    }

    /// A circulation block still allows physical delivery, so it is a
    /// separate predicate rather than a denied affiliation.
    pub fn offsite_blocked(&self) -> bool {
        self.affils.iter().any(|a| BLOCKED_AFFIL.is_match(a))
    }

    /// Electronic document delivery has extra requirements on top of the
    /// offsite affiliation policy.
    pub fn edd_eligible(&self) -> bool {
        if self.patron_groups().iter().any(|g| g == EDD_DENIED_GROUP) {
            return false;
        }
        !self.offsite_blocked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patron_with_affils(affils: &[&str]) -> Patron {
        Patron {
            uni: "ab1234".into(),
            email: "ab1234@valence-lib.org".into(),
            barcode: Some("123456789".into()),
            affils: affils.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn patron_groups_from_affils() {
        let patron = patron_with_affils(&[
            "LIB_role-circ-GRD",
            "LIB_role-circ-REG",
            "staff",
            "LIB_role-circ-GRD-blocked",
        ]);
        assert_eq!(patron.patron_groups(), vec!["GRD", "REG"]);
    }

    #[test]
    fn denied_affils_reject_before_permitted() {
        let patron = patron_with_affils(&["LIB_role-circ-REG", "LIB_suspended"]);
        let permitted = vec!["LIB_role-circ-REG".to_string()];
        let denied = vec!["LIB_suspended".to_string()];
        assert!(!patron.affils_permit(&permitted, &denied));
        assert!(patron.affils_permit(&permitted, &[]));
    }

    #[test]
    fn empty_permitted_list_grants_nothing() {
        let patron = patron_with_affils(&["LIB_role-circ-REG"]);
        assert!(!patron.affils_permit(&[], &[]));
    }

    #[test]
    fn edd_eligibility() {
        assert!(patron_with_affils(&["LIB_role-circ-GRD"]).edd_eligible());
        assert!(!patron_with_affils(&["LIB_role-circ-RECAP"]).edd_eligible());
        assert!(
            !patron_with_affils(&["LIB_role-circ-GRD", "LIB_role-circ-GRD-blocked"])
                .edd_eligible()
        );
    }
}
