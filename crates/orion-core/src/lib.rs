//! Shared models, configuration and error types for the Orion EDGAR
//! ingestion pipeline. Every other crate in the workspace depends on this
//! one for its `FilingRecord`/`Person`/`Event`/`Sector` vocabulary, its
//! `AppConfig` loader, and its `OrionError` taxonomy.

pub mod cik;
pub mod config;
pub mod error;
pub mod models;

pub use cik::{company_id, is_valid_cik, pad_cik, unpad_cik};
pub use config::AppConfig;
pub use error::{OrionError, OrionResult};
pub use models::*;
