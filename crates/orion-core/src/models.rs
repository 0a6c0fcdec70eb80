//! In-memory entity types shared across the ingestion, parsing and graph
//! crates. These mirror the on-disk/graph data model: a `FilingRecord` is
//! parsed once per filing and fed into extraction, which produces `Person`,
//! `Event`, `Sector` and `OwnershipEdge` values upserted into the graph.

use serde::{Deserialize, Serialize};

/// A fully (or partially) parsed 6-K filing, produced by the filing parser.
/// Unparseable filings are represented as a record with an empty `cik`,
/// which downstream consumers must treat as "not usable".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilingRecord {
    pub cik: String,
    pub company_name: String,
    pub form_type: String,
    pub accession_number: String,
    pub filing_date: String,
    pub sic_code: String,
    pub sic_description: String,
    pub street1: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub business_phone: String,
    pub file_number: String,
    pub fiscal_year_end: String,
    pub year: String,
    /// First `<TEXT>…</TEXT>` block found in the filing.
    pub html_content: String,
    /// Entire file content, decoded lossily as UTF-8.
    pub raw_text: String,
}

impl FilingRecord {
    pub fn is_usable(&self) -> bool {
        !self.cik.is_empty()
    }

    /// `raw_text` and `html_content` concatenated, the unit extraction runs
    /// its regex families against.
    pub fn body(&self) -> String {
        format!("{}\n{}", self.raw_text, self.html_content)
    }
}

/// Role a `Person` plays with respect to the filing company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Ceo,
    Director,
    Officer,
    Signatory,
    Contact,
    Executive,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Ceo => "CEO",
            Role::Director => "Director",
            Role::Officer => "Officer",
            Role::Signatory => "Signatory",
            Role::Contact => "Contact",
            Role::Executive => "Executive",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub title: String,
    pub role: Role,
}

impl Person {
    /// Deterministic id: `person_<slug>_<cik>`, stable across re-ingestion
    /// of the same filing.
    pub fn id(&self, cik: &str) -> String {
        format!("person_{}_{}", slugify(&self.name), cik)
    }

    /// Case-folded key used for within-filing dedup.
    pub fn dedup_key(&self) -> String {
        self.name.to_lowercase()
    }
}

fn slugify(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    FinancialResults,
    Merger,
    Acquisition,
    Restructuring,
    Filing,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::FinancialResults => "Financial Results",
            EventType::Merger => "Merger",
            EventType::Acquisition => "Acquisition",
            EventType::Restructuring => "Restructuring",
            EventType::Filing => "Filing",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub event_type: EventType,
    pub title: String,
    pub date: String,
    pub filing_id: String,
    pub description: String,
}

impl Event {
    /// `event_<accession>_<type>`, uniquely determined by (accession, type)
    /// so reloading a filing never duplicates its event node.
    pub fn make_id(accession: &str, event_type: EventType) -> String {
        format!(
            "event_{}_{}",
            accession,
            slugify(event_type.as_str())
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sector {
    pub sic_code: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnershipKind {
    Owns,
    SubsidiaryOf,
}

impl OwnershipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnershipKind::Owns => "OWNS",
            OwnershipKind::SubsidiaryOf => "SUBSIDIARY_OF",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipEdge {
    pub parent_name: String,
    pub child_name: String,
    pub kind: OwnershipKind,
    pub ownership_type: String,
}

/// Per-filing counters, accumulated into `AggregateStats` across a batch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FilingStats {
    pub companies: u32,
    pub people: u32,
    pub events: u32,
    pub relationships: u32,
    /// Ownership pairs extracted but not resolved to a CIK, per the
    /// name→CIK resolution policy — counted rather than dropped silently.
    pub ownership_unresolved: u32,
}

impl std::ops::AddAssign for FilingStats {
    fn add_assign(&mut self, rhs: Self) {
        self.companies += rhs.companies;
        self.people += rhs.people;
        self.events += rhs.events;
        self.relationships += rhs.relationships;
        self.ownership_unresolved += rhs.ownership_unresolved;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    pub stats: FilingStats,
    pub filings_processed: u32,
    pub filings_failed: u32,
    pub elapsed_seconds: f64,
}

impl AggregateStats {
    pub fn record_success(&mut self, stats: FilingStats) {
        self.stats += stats;
        self.filings_processed += 1;
    }

    pub fn record_failure(&mut self) {
        self.filings_failed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_id_is_stable_and_slugified() {
        let p = Person {
            name: "Jane A. Doe".to_string(),
            title: "Authorised Signatory".to_string(),
            role: Role::Signatory,
        };
        assert_eq!(p.id("0000123456"), "person_jane_a_doe_0000123456");
    }

    #[test]
    fn event_id_depends_only_on_accession_and_type() {
        let a = Event::make_id("0001234567-09-000123", EventType::FinancialResults);
        let b = Event::make_id("0001234567-09-000123", EventType::FinancialResults);
        assert_eq!(a, b);
        assert_eq!(a, "event_0001234567-09-000123_financial_results");
    }

    #[test]
    fn aggregate_stats_sum_across_filings() {
        let mut agg = AggregateStats::default();
        agg.record_success(FilingStats {
            companies: 1,
            people: 2,
            events: 1,
            relationships: 3,
            ownership_unresolved: 0,
        });
        agg.record_success(FilingStats {
            companies: 1,
            people: 0,
            events: 1,
            relationships: 1,
            ownership_unresolved: 1,
        });
        agg.record_failure();
        assert_eq!(agg.stats.companies, 2);
        assert_eq!(agg.stats.people, 2);
        assert_eq!(agg.filings_processed, 2);
        assert_eq!(agg.filings_failed, 1);
        assert_eq!(agg.stats.ownership_unresolved, 1);
    }

    #[test]
    fn filing_record_usability_depends_on_cik() {
        let empty = FilingRecord::default();
        assert!(!empty.is_usable());
        let filled = FilingRecord {
            cik: "0000123456".to_string(),
            ..Default::default()
        };
        assert!(filled.is_usable());
    }
}
