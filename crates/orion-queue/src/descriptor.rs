//! The on-disk job format: one JSON file per filing, renamed between
//! `pending/`, `processing/`, `completed/` and `failed/` as it moves
//! through the queue. The rename itself is the claim — no separate lock
//! file or database row is needed.

use std::path::PathBuf;

use orion_core::FilingStats;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub filing_path: PathBuf,
    pub filing_name: String,
    pub use_ai_extraction: bool,
    pub created_at: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<FilingStats>,
}

impl JobDescriptor {
    pub fn new(filing_path: PathBuf, use_ai_extraction: bool, created_at: f64) -> Self {
        let filing_name = filing_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        Self { filing_path, filing_name, use_ai_extraction, created_at, worker_id: None, completed_at: None, stats: None }
    }

    /// The job file's base name, derived from the filing's stem so a job
    /// file and its filing stay correlated on disk.
    pub fn job_file_name(filing_path: &std::path::Path) -> String {
        let stem = filing_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        format!("{stem}.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_file_name_uses_filing_stem() {
        let path = PathBuf::from("/data/filings/2023/acme_0000123456.txt");
        assert_eq!(JobDescriptor::job_file_name(&path), "acme_0000123456.json");
    }

    #[test]
    fn new_job_has_no_stats_until_completed() {
        let job = JobDescriptor::new(PathBuf::from("/data/filings/2023/acme.txt"), true, 1000.0);
        assert!(job.stats.is_none());
        assert!(job.worker_id.is_none());
    }
}
