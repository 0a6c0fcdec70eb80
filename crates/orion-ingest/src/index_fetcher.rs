//! C1 — Index Fetcher. Enumerates filer CIKs that have filed a 6-K from the
//! archive's quarterly `company.idx` files.

use crate::rate_limiter::RateRegulator;
use orion_core::{AppConfig, OrionError, OrionResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const INDEX_URL_TEMPLATE: &str = "https://www.sec.gov/Archives/edgar/full-index/{year}/QTR{qtr}/company.idx";
const HEADER_LINES_TO_SKIP: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FpiEntry {
    pub company_name: String,
    pub cik: String,
}

pub struct IndexFetcher {
    client: reqwest::Client,
    regulator: RateRegulator,
    user_agent: String,
}

impl IndexFetcher {
    pub fn new(config: &AppConfig, regulator: RateRegulator) -> Self {
        Self {
            client: reqwest::Client::new(),
            regulator,
            user_agent: config.user_agent.clone(),
        }
    }

    fn index_url(year: i32, quarter: u8) -> String {
        INDEX_URL_TEMPLATE
            .replace("{year}", &year.to_string())
            .replace("{qtr}", &quarter.to_string())
    }

    /// Fetch and parse one quarter's index file, keeping only 6-K filers.
    pub async fn fetch_quarter(&self, year: i32, quarter: u8) -> OrionResult<Vec<FpiEntry>> {
        let url = Self::index_url(year, quarter);
        self.regulator.acquire().await;

        let response = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await?;

        if response.status().as_u16() == 429 {
            self.regulator.backoff_429().await;
            self.regulator.acquire().await;
            let retry = self
                .client
                .get(&url)
                .header("User-Agent", &self.user_agent)
                .timeout(std::time::Duration::from_secs(30))
                .send()
                .await?;
            return parse_fpi_entries(&retry.text().await?);
        }

        if !response.status().is_success() {
            warn!("index fetch for {}-Q{} failed: {}", year, quarter, response.status());
            return Ok(Vec::new());
        }

        let body = response.text().await?;
        parse_fpi_entries(&body)
    }

    /// Fetch every quarter across the inclusive year range, merge by CIK
    /// (last write wins, matching `collect_fpis`), and persist a CSV cache.
    pub async fn collect_years(
        &self,
        config: &AppConfig,
        start_year: i32,
        end_year: i32,
    ) -> OrionResult<Vec<FpiEntry>> {
        let mut by_cik: HashMap<String, FpiEntry> = HashMap::new();

        for year in start_year..=end_year {
            for quarter in 1..=4u8 {
                info!("fetching company index {}-Q{}", year, quarter);
                match self.fetch_quarter(year, quarter).await {
                    Ok(entries) => {
                        for entry in entries {
                            by_cik.insert(entry.cik.clone(), entry);
                        }
                    }
                    Err(e) => {
                        e.log_with_context("index fetch");
                    }
                }
            }
        }

        let entries: Vec<FpiEntry> = by_cik.into_values().collect();
        self.write_cache(config, &entries)?;
        info!("collected {} FPI filers", entries.len());
        Ok(entries)
    }

    fn cache_path(config: &AppConfig) -> PathBuf {
        config.orion_data_dir.join("fpi_list.csv")
    }

    fn write_cache(&self, config: &AppConfig, entries: &[FpiEntry]) -> OrionResult<()> {
        let path = Self::cache_path(config);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp_path)
                .map_err(|e| OrionError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            for entry in entries {
                writer
                    .serialize(entry)
                    .map_err(|e| OrionError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp_path, &path)?;
        debug!("wrote FPI cache to {:?}", path);
        Ok(())
    }

    /// Load a previously written FPI cache, if present.
    pub fn load_cache(config: &AppConfig) -> OrionResult<Vec<FpiEntry>> {
        let path = Self::cache_path(config);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| OrionError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        let mut entries = Vec::new();
        for result in reader.deserialize::<FpiEntry>() {
            entries.push(result.map_err(|e| OrionError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?);
        }
        Ok(entries)
    }
}

fn parse_fpi_entries(idx_text: &str) -> OrionResult<Vec<FpiEntry>> {
    let mut by_cik: HashMap<String, FpiEntry> = HashMap::new();

    for line in idx_text.lines().skip(HEADER_LINES_TO_SKIP) {
        if line.len() < 86 {
            continue;
        }
        let form_type = line[62..74].trim();
        if form_type != "6-K" {
            continue;
        }
        let company_name = line[0..62].trim().to_string();
        let cik = line[74..86].trim().to_string();
        if cik.is_empty() {
            continue;
        }
        by_cik.entry(cik.clone()).or_insert(FpiEntry { company_name, cik });
    }

    Ok(by_cik.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_line(company: &str, form_type: &str, cik: &str) -> String {
        format!("{:<62}{:<12}{:<12}20090715  0000123456-09-000123.txt", company, form_type, cik)
    }

    #[test]
    fn keeps_only_6k_filings() {
        let mut lines: Vec<String> = (0..HEADER_LINES_TO_SKIP).map(|_| "header".to_string()).collect();
        lines.push(sample_line("Example Corp", "6-K", "123456"));
        lines.push(sample_line("Other Corp", "10-K", "654321"));
        let idx_text = lines.join("\n");

        let entries = parse_fpi_entries(&idx_text).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].cik, "123456");
        assert_eq!(entries[0].company_name, "Example Corp");
    }

    #[test]
    fn skips_malformed_short_lines() {
        let mut lines: Vec<String> = (0..HEADER_LINES_TO_SKIP).map(|_| "header".to_string()).collect();
        lines.push("too short".to_string());
        let idx_text = lines.join("\n");
        assert!(parse_fpi_entries(&idx_text).unwrap().is_empty());
    }

    #[test]
    fn dedupes_by_cik_keeping_first() {
        let mut lines: Vec<String> = (0..HEADER_LINES_TO_SKIP).map(|_| "header".to_string()).collect();
        lines.push(sample_line("Example Corp", "6-K", "123456"));
        lines.push(sample_line("Example Corp Renamed", "6-K", "123456"));
        let idx_text = lines.join("\n");

        let entries = parse_fpi_entries(&idx_text).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].company_name, "Example Corp");
    }

    #[test]
    fn builds_expected_index_url() {
        assert_eq!(
            IndexFetcher::index_url(2009, 2),
            "https://www.sec.gov/Archives/edgar/full-index/2009/QTR2/company.idx"
        );
    }
}
