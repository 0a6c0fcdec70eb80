//! Entity and relationship extraction from filing text, and idempotent
//! upserts of the result into a property graph.

pub mod events;
pub mod graph_store;
pub mod loader;
pub mod ownership;
pub mod people;

pub use events::extract_event;
pub use graph_store::{GraphStore, Neo4jGraphStore};
pub use loader::GraphLoader;
pub use ownership::{extract_ownership, NameToCikIndex, ResolvedOwnership};
pub use people::{classify_role, extract_people, is_valid_person_name, is_valid_title};
