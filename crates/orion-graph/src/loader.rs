//! Orchestrates one filing (or a batch of filings) through extraction and
//! upsert. Mirrors the source's per-step try/continue discipline: a
//! failure extracting or upserting one kind of entity is logged and does
//! not stop the remaining steps for the same filing.

use std::collections::HashSet;
use std::path::Path;

use orion_core::{AggregateStats, FilingRecord, FilingStats, OrionError};

use crate::events;
use crate::graph_store::GraphStore;
use crate::ownership::{self, NameToCikIndex};
use crate::people;

/// Tracks which ids have already been upserted this run, mirroring the
/// source's `processed_companies`/`processed_people`/`processed_events`/
/// `processed_sectors` sets. Upserts are idempotent in the graph regardless,
/// but skipping a repeat saves a round trip for the common case of many
/// filings from the same company.
pub struct GraphLoader<S: GraphStore> {
    store: S,
    name_index: NameToCikIndex,
    processed_companies: HashSet<String>,
    processed_people: HashSet<String>,
    processed_events: HashSet<String>,
    processed_sectors: HashSet<String>,
}

impl<S: GraphStore> GraphLoader<S> {
    pub fn new(store: S, name_index: NameToCikIndex) -> Self {
        Self {
            store,
            name_index,
            processed_companies: HashSet::new(),
            processed_people: HashSet::new(),
            processed_events: HashSet::new(),
            processed_sectors: HashSet::new(),
        }
    }

    /// The six-step procedure: company, sector (if present), people,
    /// event, ownership. Each step is isolated — a failure in one does not
    /// prevent the others from running.
    pub async fn process_filing(&mut self, record: &FilingRecord) -> FilingStats {
        let mut stats = FilingStats::default();

        if !record.is_usable() {
            tracing::warn!("skipping filing with no usable CIK");
            return stats;
        }

        let company_id = orion_core::company_id(&record.cik);
        self.name_index.insert(&record.company_name, &record.cik);

        if !self.processed_companies.contains(&company_id) {
            match self
                .store
                .upsert_company(&record.cik, &company_id, &record.company_name, &record.sic_code)
                .await
            {
                Ok(()) => {
                    self.processed_companies.insert(company_id.clone());
                    stats.companies += 1;
                }
                Err(e) => log_step_error("upsert_company", &record.accession_number, &e),
            }
        }

        if !record.sic_code.is_empty() {
            let sector_id = format!("sector_{}", record.sic_code);
            if !self.processed_sectors.contains(&sector_id) {
                let sector = orion_core::Sector {
                    sic_code: record.sic_code.clone(),
                    name: record.sic_description.clone(),
                    description: record.sic_description.clone(),
                };
                match self.store.upsert_sector(&sector).await {
                    Ok(()) => {
                        self.processed_sectors.insert(sector_id.clone());
                    }
                    Err(e) => log_step_error("upsert_sector", &record.accession_number, &e),
                }
            }
            if let Err(e) = self.store.link_company_to_sector(&company_id, &record.sic_code).await {
                log_step_error("link_company_to_sector", &record.accession_number, &e);
            }
        }

        let body = record.body();

        for person in people::extract_people(&body) {
            let person_id = person.id(&record.cik);
            if !self.processed_people.contains(&person_id) {
                match self.store.upsert_person(&person_id, &person).await {
                    Ok(()) => {
                        self.processed_people.insert(person_id.clone());
                        stats.people += 1;
                    }
                    Err(e) => {
                        log_step_error("upsert_person", &record.accession_number, &e);
                        continue;
                    }
                }
            }
            if let Err(e) = self.store.link_person_works_at(&person_id, &company_id, person.role.as_str()).await {
                log_step_error("link_person_works_at", &record.accession_number, &e);
            } else {
                stats.relationships += 1;
            }
        }

        let event = events::extract_event(&record.accession_number, &record.filing_date, &body);
        if !self.processed_events.contains(&event.id) {
            match self.store.upsert_event(&event).await {
                Ok(()) => {
                    self.processed_events.insert(event.id.clone());
                    stats.events += 1;
                }
                Err(e) => log_step_error("upsert_event", &record.accession_number, &e),
            }
        }
        if let Err(e) = self.store.link_company_has_event(&company_id, &event.id).await {
            log_step_error("link_company_has_event", &record.accession_number, &e);
        } else {
            stats.relationships += 1;
        }

        let (resolved_edges, unresolved) =
            ownership::extract_ownership(&body, &record.company_name, &self.name_index);
        stats.ownership_unresolved += unresolved;
        for resolved in resolved_edges {
            let parent_id = orion_core::company_id(&resolved.parent_cik);
            let child_id = orion_core::company_id(&resolved.child_cik);
            if let Err(e) = self
                .store
                .upsert_ownership(&parent_id, &child_id, resolved.edge.kind.as_str(), &resolved.edge.ownership_type)
                .await
            {
                log_step_error("upsert_ownership", &record.accession_number, &e);
            } else {
                stats.relationships += 1;
            }
        }

        stats
    }

    /// Process every filing found under `filings_dir` (optionally filtered
    /// to one year), parsing each with `orion_parser::parse_filing` and
    /// accumulating per-filing stats into an `AggregateStats`.
    pub async fn process_filings(&mut self, filings_dir: &Path, year: Option<i32>) -> AggregateStats {
        let mut aggregate = AggregateStats::default();
        let paths = orion_parser::list_filings(filings_dir, year);
        for path in paths {
            let record = orion_parser::parse_filing(&path);
            if !record.is_usable() {
                tracing::warn!(path = %path.display(), "skipping unparseable filing");
                aggregate.record_failure();
                continue;
            }
            let stats = self.process_filing(&record).await;
            aggregate.record_success(stats);
        }
        aggregate
    }
}

fn log_step_error(step: &str, accession: &str, err: &OrionError) {
    tracing::warn!(step, accession, error = %err, "graph upsert step failed, continuing");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_store::fake::FakeGraphStore;
    use orion_core::FilingRecord;

    fn sample_record() -> FilingRecord {
        FilingRecord {
            cik: "0000123456".to_string(),
            company_name: "Acme Holdings Inc".to_string(),
            form_type: "6-K".to_string(),
            accession_number: "0001234567-23-000001".to_string(),
            filing_date: "2023-05-01".to_string(),
            sic_code: "2834".to_string(),
            sic_description: "Pharmaceutical Preparations".to_string(),
            raw_text: "Chief Executive Officer: Jane A. Doe. We report our quarterly results today.".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn process_filing_populates_company_person_and_event() {
        let store = FakeGraphStore::new();
        let mut loader = GraphLoader::new(store, NameToCikIndex::new());
        let record = sample_record();

        let stats = loader.process_filing(&record).await;

        assert_eq!(stats.companies, 1);
        assert_eq!(stats.people, 1);
        assert_eq!(stats.events, 1);
        assert_eq!(loader.store.companies.lock().unwrap().len(), 1);
        assert_eq!(loader.store.people.lock().unwrap().len(), 1);
        assert_eq!(loader.store.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reprocessing_same_filing_does_not_duplicate_nodes() {
        let store = FakeGraphStore::new();
        let mut loader = GraphLoader::new(store, NameToCikIndex::new());
        let record = sample_record();

        loader.process_filing(&record).await;
        loader.process_filing(&record).await;

        assert_eq!(loader.store.companies.lock().unwrap().len(), 1);
        assert_eq!(loader.store.people.lock().unwrap().len(), 1);
        assert_eq!(loader.store.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unusable_filing_is_skipped_with_empty_stats() {
        let store = FakeGraphStore::new();
        let mut loader = GraphLoader::new(store, NameToCikIndex::new());
        let record = FilingRecord::default();

        let stats = loader.process_filing(&record).await;

        assert_eq!(stats.companies, 0);
        assert!(loader.store.companies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sector_is_linked_only_when_sic_code_present() {
        let store = FakeGraphStore::new();
        let mut loader = GraphLoader::new(store, NameToCikIndex::new());
        let mut record = sample_record();
        record.sic_code = String::new();

        loader.process_filing(&record).await;

        assert!(loader.store.sectors.lock().unwrap().is_empty());
    }
}
