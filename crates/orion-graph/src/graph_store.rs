//! The graph persistence seam. `GraphStore` is implemented by
//! `Neo4jGraphStore` for real runs and by `FakeGraphStore` for the
//! idempotence-law tests in `loader.rs` — neither the extraction code nor
//! the loader's orchestration logic needs to know which one it's talking
//! to.

use async_trait::async_trait;
use neo4rs::{query, Graph};
use orion_core::{Event, OrionError, OrionResult, Person, Sector};

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_company(&self, cik: &str, company_id: &str, name: &str, sic_code: &str) -> OrionResult<()>;

    async fn upsert_sector(&self, sector: &Sector) -> OrionResult<()>;

    async fn link_company_to_sector(&self, company_id: &str, sic_code: &str) -> OrionResult<()>;

    async fn upsert_person(&self, person_id: &str, person: &Person) -> OrionResult<()>;

    async fn link_person_works_at(&self, person_id: &str, company_id: &str, role: &str) -> OrionResult<()>;

    async fn upsert_event(&self, event: &Event) -> OrionResult<()>;

    async fn link_company_has_event(&self, company_id: &str, event_id: &str) -> OrionResult<()>;

    async fn upsert_ownership(
        &self,
        parent_company_id: &str,
        child_company_id: &str,
        relationship: &str,
        ownership_type: &str,
    ) -> OrionResult<()>;

    async fn setup_schema(&self) -> OrionResult<()>;

    async fn clear_graph(&self) -> OrionResult<()>;
}

/// Neo4j-backed implementation over the Bolt protocol. Every write is a
/// `MERGE` keyed on the deterministic id, with `SET` using
/// `COALESCE(NULLIF($value, ''), existing)` so re-ingesting a filing only
/// ever enriches a node, never blanks a field a richer filing already
/// populated.
pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    pub async fn connect(uri: &str, user: &str, password: &str) -> OrionResult<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| OrionError::graph(format!("failed to connect to {uri}: {e}")))?;
        Ok(Self { graph })
    }

    async fn run(&self, q: neo4rs::Query) -> OrionResult<()> {
        self.graph.run(q).await.map_err(|e| OrionError::graph(e.to_string()))
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn upsert_company(&self, cik: &str, company_id: &str, name: &str, sic_code: &str) -> OrionResult<()> {
        let q = query(
            "MERGE (c:Company {id: $id}) \
             ON CREATE SET c.cik = $cik \
             SET c.name = COALESCE(NULLIF($name, ''), c.name), \
                 c.sic_code = COALESCE(NULLIF($sic_code, ''), c.sic_code)",
        )
        .param("id", company_id)
        .param("cik", cik)
        .param("name", name)
        .param("sic_code", sic_code);
        self.run(q).await
    }

    async fn upsert_sector(&self, sector: &Sector) -> OrionResult<()> {
        let q = query(
            "MERGE (s:Sector {sic_code: $sic_code}) \
             SET s.name = COALESCE(NULLIF($name, ''), s.name), \
                 s.description = COALESCE(NULLIF($description, ''), s.description)",
        )
        .param("sic_code", sector.sic_code.as_str())
        .param("name", sector.name.as_str())
        .param("description", sector.description.as_str());
        self.run(q).await
    }

    async fn link_company_to_sector(&self, company_id: &str, sic_code: &str) -> OrionResult<()> {
        let q = query(
            "MATCH (c:Company {id: $company_id}), (s:Sector {sic_code: $sic_code}) \
             MERGE (c)-[:BELONGS_TO_SECTOR]->(s)",
        )
        .param("company_id", company_id)
        .param("sic_code", sic_code);
        self.run(q).await
    }

    async fn upsert_person(&self, person_id: &str, person: &Person) -> OrionResult<()> {
        let q = query(
            "MERGE (p:Person {id: $id}) \
             SET p.name = COALESCE(NULLIF($name, ''), p.name), \
                 p.title = COALESCE(NULLIF($title, ''), p.title), \
                 p.role = COALESCE(NULLIF($role, ''), p.role)",
        )
        .param("id", person_id)
        .param("name", person.name.as_str())
        .param("title", person.title.as_str())
        .param("role", person.role.as_str());
        self.run(q).await
    }

    async fn link_person_works_at(&self, person_id: &str, company_id: &str, role: &str) -> OrionResult<()> {
        let q = query(
            "MATCH (p:Person {id: $person_id}), (c:Company {id: $company_id}) \
             MERGE (p)-[r:WORKS_AT]->(c) \
             SET r.role = COALESCE(NULLIF($role, ''), r.role)",
        )
        .param("person_id", person_id)
        .param("company_id", company_id)
        .param("role", role);
        self.run(q).await
    }

    async fn upsert_event(&self, event: &Event) -> OrionResult<()> {
        let q = query(
            "MERGE (e:Event {id: $id}) \
             SET e.event_type = COALESCE(NULLIF($event_type, ''), e.event_type), \
                 e.title = COALESCE(NULLIF($title, ''), e.title), \
                 e.date = COALESCE(NULLIF($date, ''), e.date), \
                 e.filing_id = COALESCE(NULLIF($filing_id, ''), e.filing_id), \
                 e.description = COALESCE(NULLIF($description, ''), e.description)",
        )
        .param("id", event.id.as_str())
        .param("event_type", event.event_type.as_str())
        .param("title", event.title.as_str())
        .param("date", event.date.as_str())
        .param("filing_id", event.filing_id.as_str())
        .param("description", event.description.as_str());
        self.run(q).await
    }

    async fn link_company_has_event(&self, company_id: &str, event_id: &str) -> OrionResult<()> {
        let q = query(
            "MATCH (c:Company {id: $company_id}), (e:Event {id: $event_id}) \
             MERGE (c)-[:HAS_EVENT]->(e)",
        )
        .param("company_id", company_id)
        .param("event_id", event_id);
        self.run(q).await
    }

    async fn upsert_ownership(
        &self,
        parent_company_id: &str,
        child_company_id: &str,
        relationship: &str,
        ownership_type: &str,
    ) -> OrionResult<()> {
        let cypher = format!(
            "MATCH (parent:Company {{id: $parent_id}}), (child:Company {{id: $child_id}}) \
             MERGE (parent)-[r:{relationship}]->(child) \
             SET r.ownership_type = COALESCE(NULLIF($ownership_type, ''), r.ownership_type)"
        );
        let q = query(&cypher)
            .param("parent_id", parent_company_id)
            .param("child_id", child_company_id)
            .param("ownership_type", ownership_type);
        self.run(q).await
    }

    async fn setup_schema(&self) -> OrionResult<()> {
        let statements = [
            "CREATE CONSTRAINT company_cik_unique IF NOT EXISTS FOR (c:Company) REQUIRE c.cik IS UNIQUE",
            "CREATE CONSTRAINT company_id_unique IF NOT EXISTS FOR (c:Company) REQUIRE c.id IS UNIQUE",
            "CREATE CONSTRAINT person_id_unique IF NOT EXISTS FOR (p:Person) REQUIRE p.id IS UNIQUE",
            "CREATE CONSTRAINT event_id_unique IF NOT EXISTS FOR (e:Event) REQUIRE e.id IS UNIQUE",
            "CREATE CONSTRAINT sector_sic_unique IF NOT EXISTS FOR (s:Sector) REQUIRE s.sic_code IS UNIQUE",
            "CREATE INDEX company_name_index IF NOT EXISTS FOR (c:Company) ON (c.name)",
            "CREATE INDEX sector_sic_index IF NOT EXISTS FOR (s:Sector) ON (s.sic_code)",
            "CREATE INDEX person_role_index IF NOT EXISTS FOR (p:Person) ON (p.role)",
            "CREATE INDEX event_lookup_index IF NOT EXISTS FOR (e:Event) ON (e.event_type, e.date, e.filing_id)",
        ];
        for stmt in statements {
            self.run(query(stmt)).await?;
        }
        Ok(())
    }

    async fn clear_graph(&self) -> OrionResult<()> {
        self.run(query("MATCH (n) DETACH DELETE n")).await
    }
}

/// In-memory double for loader tests: records every upsert/link call so
/// tests can assert idempotence (re-running `process_filing` on the same
/// input does not grow the recorded call count beyond the first run's
/// distinct set).
#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct FakeGraphStore {
        pub companies: Mutex<std::collections::HashMap<String, (String, String, String)>>,
        pub sectors: Mutex<std::collections::HashSet<String>>,
        pub sector_links: Mutex<std::collections::HashSet<(String, String)>>,
        pub people: Mutex<std::collections::HashMap<String, (String, String, String)>>,
        pub works_at_links: Mutex<std::collections::HashSet<(String, String)>>,
        pub events: Mutex<std::collections::HashSet<String>>,
        pub has_event_links: Mutex<std::collections::HashSet<(String, String)>>,
        pub ownership_edges: Mutex<std::collections::HashSet<(String, String, String)>>,
        pub schema_setup_calls: Mutex<u32>,
        pub clear_calls: Mutex<u32>,
    }

    impl FakeGraphStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl GraphStore for FakeGraphStore {
        async fn upsert_company(&self, cik: &str, company_id: &str, name: &str, sic_code: &str) -> OrionResult<()> {
            self.companies
                .lock()
                .unwrap()
                .insert(company_id.to_string(), (cik.to_string(), name.to_string(), sic_code.to_string()));
            Ok(())
        }

        async fn upsert_sector(&self, sector: &Sector) -> OrionResult<()> {
            self.sectors.lock().unwrap().insert(sector.sic_code.clone());
            Ok(())
        }

        async fn link_company_to_sector(&self, company_id: &str, sic_code: &str) -> OrionResult<()> {
            self.sector_links.lock().unwrap().insert((company_id.to_string(), sic_code.to_string()));
            Ok(())
        }

        async fn upsert_person(&self, person_id: &str, person: &Person) -> OrionResult<()> {
            self.people.lock().unwrap().insert(
                person_id.to_string(),
                (person.name.clone(), person.title.clone(), person.role.as_str().to_string()),
            );
            Ok(())
        }

        async fn link_person_works_at(&self, person_id: &str, company_id: &str, _role: &str) -> OrionResult<()> {
            self.works_at_links.lock().unwrap().insert((person_id.to_string(), company_id.to_string()));
            Ok(())
        }

        async fn upsert_event(&self, event: &Event) -> OrionResult<()> {
            self.events.lock().unwrap().insert(event.id.clone());
            Ok(())
        }

        async fn link_company_has_event(&self, company_id: &str, event_id: &str) -> OrionResult<()> {
            self.has_event_links.lock().unwrap().insert((company_id.to_string(), event_id.to_string()));
            Ok(())
        }

        async fn upsert_ownership(
            &self,
            parent_company_id: &str,
            child_company_id: &str,
            relationship: &str,
            _ownership_type: &str,
        ) -> OrionResult<()> {
            self.ownership_edges.lock().unwrap().insert((
                parent_company_id.to_string(),
                child_company_id.to_string(),
                relationship.to_string(),
            ));
            Ok(())
        }

        async fn setup_schema(&self) -> OrionResult<()> {
            *self.schema_setup_calls.lock().unwrap() += 1;
            Ok(())
        }

        async fn clear_graph(&self) -> OrionResult<()> {
            *self.clear_calls.lock().unwrap() += 1;
            self.companies.lock().unwrap().clear();
            self.sectors.lock().unwrap().clear();
            self.sector_links.lock().unwrap().clear();
            self.people.lock().unwrap().clear();
            self.works_at_links.lock().unwrap().clear();
            self.events.lock().unwrap().clear();
            self.has_event_links.lock().unwrap().clear();
            self.ownership_edges.lock().unwrap().clear();
            Ok(())
        }
    }
}
