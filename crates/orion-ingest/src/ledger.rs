//! The metadata ledger: an append-only CSV file with one row per
//! successfully downloaded filing. Duplicate-tolerant by design — readers
//! must dedupe on accession number, matching skip-existing re-runs that
//! still append a row.

use orion_core::{OrionError, OrionResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRow {
    #[serde(rename = "Company Name")]
    pub company_name: String,
    #[serde(rename = "CIK")]
    pub cik: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Accession Number")]
    pub accession: String,
    #[serde(rename = "HTML File")]
    pub html_file: String,
    #[serde(rename = "TXT File")]
    pub txt_file: String,
    #[serde(rename = "Exhibits")]
    pub exhibits: String,
}

/// Append one row, writing the header only if the file does not yet exist.
pub fn append_row(ledger_path: &Path, row: &MetadataRow) -> OrionResult<()> {
    let file_is_new = !ledger_path.exists();
    if let Some(parent) = ledger_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(ledger_path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if file_is_new {
        writer
            .write_record([
                "Company Name",
                "CIK",
                "Date",
                "Accession Number",
                "HTML File",
                "TXT File",
                "Exhibits",
            ])
            .map_err(|e| OrionError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    }

    writer
        .serialize(row)
        .map_err(|e| OrionError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    writer
        .flush()
        .map_err(OrionError::Io)?;
    Ok(())
}

/// Read every row in the ledger, deduping on accession (last write wins).
pub fn read_rows(ledger_path: &Path) -> OrionResult<Vec<MetadataRow>> {
    if !ledger_path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(ledger_path)
        .map_err(|e| OrionError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

    let mut by_accession: HashMap<String, MetadataRow> = HashMap::new();
    for result in reader.deserialize::<MetadataRow>() {
        let row = result.map_err(|e| OrionError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        by_accession.insert(row.accession.clone(), row);
    }
    Ok(by_accession.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_row(accession: &str) -> MetadataRow {
        MetadataRow {
            company_name: "Example Corp".to_string(),
            cik: "0000123456".to_string(),
            date: "2009-07-15".to_string(),
            accession: accession.to_string(),
            html_file: "filing.html".to_string(),
            txt_file: format!("{accession}.txt"),
            exhibits: String::new(),
        }
    }

    #[test]
    fn writes_header_exactly_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        append_row(&path, &sample_row("0001234567-09-000123")).unwrap();
        append_row(&path, &sample_row("0001234567-09-000124")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("Company Name").count(), 1);
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn read_rows_dedupes_on_accession() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        append_row(&path, &sample_row("0001234567-09-000123")).unwrap();
        append_row(&path, &sample_row("0001234567-09-000123")).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn missing_ledger_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.csv");
        assert!(read_rows(&path).unwrap().is_empty());
    }
}
