//! Ownership relationship extraction and name->CIK resolution.
//!
//! The source extracts ownership edges purely from company names in free
//! text and never actually resolves them to a CIK before writing to the
//! graph (`create_ownership_relationship` there is effectively dead code).
//! Here we resolve every extracted (parent_name, child_name) pair against
//! a name index built from the index fetcher's FPI cache and the
//! downloader's metadata ledger; pairs that don't resolve are skipped and
//! counted rather than silently dropped or written with unresolved names.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use orion_core::{OwnershipEdge, OwnershipKind};
use regex::Regex;

const NAME: &str = r"[A-Z][A-Za-z0-9&.,'\- ]{2,60}?(?:Inc|Ltd|Limited|Corp|Corporation|PLC|plc|LLC|Company|Co)\.?";

/// All four patterns here name the parent in group 1 and the child in
/// group 2, including "is the parent company of" — that phrasing reads
/// forward already, it's semantically the reverse of "subsidiary of", not
/// reversed in capture order.
static OWNS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(&format!(r"(?i)({NAME})\s+owns\s+(?:a\s+\d+%?\s+(?:stake|interest)\s+in\s+)?({NAME})")).unwrap(),
        Regex::new(&format!(r"(?i)({NAME})\s+acquired\s+({NAME})")).unwrap(),
        Regex::new(&format!(r"(?i)({NAME})\s+purchased\s+({NAME})")).unwrap(),
        Regex::new(&format!(r"(?i)({NAME})\s+is\s+the\s+parent\s+company\s+of\s+({NAME})")).unwrap(),
    ]
});

/// Both "subsidiary of" phrasings name the child in group 1 and the parent
/// in group 2.
static SUBSIDIARY_OF_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(&format!(r"(?i)({NAME})\s+is\s+a\s+subsidiary\s+of\s+({NAME})")).unwrap(),
        Regex::new(&format!(r"(?i)({NAME})\s*,\s*a\s+wholly[- ]owned\s+subsidiary\s+of\s+({NAME})")).unwrap(),
    ]
});

static FORMER_COMPANY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)Former\s+Company[:\s]+({NAME})")).unwrap());

/// Maps a lowercased company name to its CIK. Built by callers from the
/// quarterly FPI cache and the download metadata ledger.
pub struct NameToCikIndex {
    entries: HashMap<String, String>,
}

impl NameToCikIndex {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn insert(&mut self, company_name: &str, cik: &str) {
        let key = normalize_company_name(company_name);
        if key.is_empty() {
            return;
        }
        self.entries.entry(key).or_insert_with(|| cik.to_string());
    }

    pub fn resolve(&self, company_name: &str) -> Option<&str> {
        self.entries.get(&normalize_company_name(company_name)).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for NameToCikIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_company_name(name: &str) -> String {
    static SUFFIX_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)[,.\s]*(inc|ltd|limited|corp|corporation|plc|llc|co)\.?$").unwrap());
    let stripped = SUFFIX_RE.replace(name.trim(), "");
    stripped.to_lowercase()
}

/// A resolved parent/child CIK pair, ready for an upsert.
pub struct ResolvedOwnership {
    pub edge: OwnershipEdge,
    pub parent_cik: String,
    pub child_cik: String,
}

/// Extract every ownership mention from the filing body, then resolve
/// each side's CIK via the supplied index. Pairs where either side fails
/// to resolve are dropped and counted in `unresolved`. `company_name` is
/// the filing's own subject company, used as the parent side of "Former
/// Company" mentions, which name only the other side.
pub fn extract_ownership(body: &str, company_name: &str, index: &NameToCikIndex) -> (Vec<ResolvedOwnership>, u32) {
    let mut edges = Vec::new();
    let mut unresolved = 0u32;

    for pattern in OWNS_PATTERNS.iter() {
        for caps in pattern.captures_iter(body) {
            let (Some(parent), Some(child)) = (caps.get(1), caps.get(2)) else { continue };
            collect(
                parent.as_str(),
                child.as_str(),
                OwnershipKind::Owns,
                OwnershipKind::Owns.as_str(),
                index,
                &mut edges,
                &mut unresolved,
            );
        }
    }

    for pattern in SUBSIDIARY_OF_PATTERNS.iter() {
        for caps in pattern.captures_iter(body) {
            let (Some(child), Some(parent)) = (caps.get(1), caps.get(2)) else { continue };
            collect(
                parent.as_str(),
                child.as_str(),
                OwnershipKind::SubsidiaryOf,
                OwnershipKind::SubsidiaryOf.as_str(),
                index,
                &mut edges,
                &mut unresolved,
            );
        }
    }

    let company_name = company_name.trim();
    if !company_name.is_empty() {
        for caps in FORMER_COMPANY_RE.captures_iter(body) {
            let Some(former_name) = caps.get(1) else { continue };
            collect(
                company_name,
                former_name.as_str(),
                OwnershipKind::SubsidiaryOf,
                "former company",
                index,
                &mut edges,
                &mut unresolved,
            );
        }
    }

    (edges, unresolved)
}

#[allow(clippy::too_many_arguments)]
fn collect(
    parent_name: &str,
    child_name: &str,
    kind: OwnershipKind,
    ownership_type: &str,
    index: &NameToCikIndex,
    edges: &mut Vec<ResolvedOwnership>,
    unresolved: &mut u32,
) {
    let parent_name = parent_name.trim().to_string();
    let child_name = child_name.trim().to_string();
    if parent_name.eq_ignore_ascii_case(&child_name) {
        return;
    }

    match (index.resolve(&parent_name), index.resolve(&child_name)) {
        (Some(parent_cik), Some(child_cik)) => {
            edges.push(ResolvedOwnership {
                edge: OwnershipEdge { parent_name, child_name, kind, ownership_type: ownership_type.to_string() },
                parent_cik: parent_cik.to_string(),
                child_cik: child_cik.to_string(),
            });
        }
        _ => {
            *unresolved += 1;
            tracing::debug!(parent_name, child_name, "ownership edge skipped: name did not resolve to a CIK");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(pairs: &[(&str, &str)]) -> NameToCikIndex {
        let mut idx = NameToCikIndex::new();
        for (name, cik) in pairs {
            idx.insert(name, cik);
        }
        idx
    }

    #[test]
    fn resolves_owns_pattern_when_both_sides_known() {
        let index = index_with(&[("Acme Holdings Inc", "0000000001"), ("Acme Subsidiary Ltd", "0000000002")]);
        let (edges, unresolved) = extract_ownership("Acme Holdings Inc owns Acme Subsidiary Ltd", "", &index);
        assert_eq!(edges.len(), 1);
        assert_eq!(unresolved, 0);
        assert_eq!(edges[0].edge.kind, OwnershipKind::Owns);
        assert_eq!(edges[0].parent_cik, "0000000001");
        assert_eq!(edges[0].child_cik, "0000000002");
    }

    #[test]
    fn unresolved_pair_is_counted_not_dropped_silently() {
        let index = index_with(&[("Acme Holdings Inc", "0000000001")]);
        let (edges, unresolved) = extract_ownership("Acme Holdings Inc owns Unknown Corp", "", &index);
        assert!(edges.is_empty());
        assert_eq!(unresolved, 1);
    }

    #[test]
    fn subsidiary_of_pattern_orients_parent_and_child_correctly() {
        let index = index_with(&[("Acme Holdings Inc", "0000000001"), ("Acme Subsidiary Ltd", "0000000002")]);
        let (edges, _) =
            extract_ownership("Acme Subsidiary Ltd is a subsidiary of Acme Holdings Inc", "", &index);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].parent_cik, "0000000001");
        assert_eq!(edges[0].child_cik, "0000000002");
        assert_eq!(edges[0].edge.kind, OwnershipKind::SubsidiaryOf);
    }

    #[test]
    fn parent_company_of_pattern_produces_owns_edge() {
        let index = index_with(&[("Acme Holdings Inc", "0000000001"), ("Acme Subsidiary Ltd", "0000000002")]);
        let (edges, _) =
            extract_ownership("Acme Holdings Inc is the parent company of Acme Subsidiary Ltd", "", &index);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].parent_cik, "0000000001");
        assert_eq!(edges[0].child_cik, "0000000002");
        assert_eq!(edges[0].edge.kind, OwnershipKind::Owns);
    }

    #[test]
    fn former_company_mention_ties_subject_company_as_parent() {
        let index = index_with(&[("Acme Holdings Inc", "0000000001"), ("Acme Predecessor Corp", "0000000002")]);
        let (edges, _) =
            extract_ownership("Former Company: Acme Predecessor Corp", "Acme Holdings Inc", &index);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].parent_cik, "0000000001");
        assert_eq!(edges[0].child_cik, "0000000002");
        assert_eq!(edges[0].edge.kind, OwnershipKind::SubsidiaryOf);
        assert_eq!(edges[0].edge.ownership_type, "former company");
    }

    #[test]
    fn name_index_normalizes_legal_suffixes() {
        let mut index = NameToCikIndex::new();
        index.insert("Acme Holdings, Inc.", "0000000001");
        assert_eq!(index.resolve("Acme Holdings Incorporated is not the same"), None);
        assert_eq!(index.resolve("Acme Holdings"), Some("0000000001"));
    }

    #[test]
    fn self_referential_pair_is_ignored() {
        let index = index_with(&[("Acme Holdings Inc", "0000000001")]);
        let (edges, unresolved) = extract_ownership("Acme Holdings Inc owns Acme Holdings Inc", "", &index);
        assert!(edges.is_empty());
        assert_eq!(unresolved, 0);
    }
}
