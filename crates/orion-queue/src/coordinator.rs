//! Creates the job queue on disk and reports on / waits for its drain.

use std::path::{Path, PathBuf};

use orion_core::{FilingStats, OrionError, OrionResult};

use crate::descriptor::JobDescriptor;

const SUBDIRS: [&str; 4] = ["pending", "processing", "completed", "failed"];

pub struct QueueCoordinator {
    queue_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStatus {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed
    }

    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.processing == 0
    }

    pub fn progress_percent(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.completed as f64 / total as f64 * 100.0
        }
    }
}

impl QueueCoordinator {
    pub fn new(queue_dir: impl Into<PathBuf>) -> OrionResult<Self> {
        let queue_dir = queue_dir.into();
        for sub in SUBDIRS {
            std::fs::create_dir_all(queue_dir.join(sub))
                .map_err(|e| OrionError::Queue(format!("failed to create {sub} dir: {e}")))?;
        }
        Ok(Self { queue_dir })
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.queue_dir.join("pending")
    }

    pub fn processing_dir(&self) -> PathBuf {
        self.queue_dir.join("processing")
    }

    pub fn completed_dir(&self) -> PathBuf {
        self.queue_dir.join("completed")
    }

    pub fn failed_dir(&self) -> PathBuf {
        self.queue_dir.join("failed")
    }

    /// Write one job file per filing path into `pending/`. `created_at` is
    /// supplied by the caller rather than read from the clock here, so the
    /// function stays deterministic and testable.
    pub fn create_jobs(&self, filing_paths: &[PathBuf], use_ai_extraction: bool, created_at: f64) -> OrionResult<usize> {
        let mut count = 0;
        for path in filing_paths {
            let job = JobDescriptor::new(path.clone(), use_ai_extraction, created_at);
            let job_file = self.pending_dir().join(JobDescriptor::job_file_name(path));
            let body = serde_json::to_string_pretty(&job)
                .map_err(|e| OrionError::Queue(format!("failed to serialize job: {e}")))?;
            std::fs::write(&job_file, body).map_err(|e| OrionError::Queue(format!("failed to write job file: {e}")))?;
            count += 1;
        }
        Ok(count)
    }

    pub fn status(&self) -> OrionResult<QueueStatus> {
        Ok(QueueStatus {
            pending: count_json_files(&self.pending_dir())?,
            processing: count_json_files(&self.processing_dir())?,
            completed: count_json_files(&self.completed_dir())?,
            failed: count_json_files(&self.failed_dir())?,
        })
    }

    /// Sum the `stats` field of every completed job into one `FilingStats`.
    pub fn aggregate_results(&self) -> OrionResult<FilingStats> {
        let mut total = FilingStats::default();
        for entry in std::fs::read_dir(self.completed_dir())
            .map_err(|e| OrionError::Queue(format!("failed to read completed dir: {e}")))?
        {
            let entry = entry.map_err(|e| OrionError::Queue(e.to_string()))?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(entry.path())
                .map_err(|e| OrionError::Queue(format!("failed to read job result: {e}")))?;
            let job: JobDescriptor = match serde_json::from_str(&content) {
                Ok(j) => j,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable job result");
                    continue;
                }
            };
            if let Some(stats) = job.stats {
                total += stats;
            }
        }
        Ok(total)
    }
}

fn count_json_files(dir: &Path) -> OrionResult<usize> {
    let count = std::fs::read_dir(dir)
        .map_err(|e| OrionError::Queue(format!("failed to read {}: {e}", dir.display())))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|ext| ext.to_str()) == Some("json"))
        .count();
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_jobs_writes_one_file_per_filing() {
        let dir = tempdir().unwrap();
        let coordinator = QueueCoordinator::new(dir.path()).unwrap();
        let filings = vec![PathBuf::from("/data/a.txt"), PathBuf::from("/data/b.txt")];

        let count = coordinator.create_jobs(&filings, true, 1000.0).unwrap();

        assert_eq!(count, 2);
        let status = coordinator.status().unwrap();
        assert_eq!(status.pending, 2);
        assert_eq!(status.total(), 2);
    }

    #[test]
    fn status_reflects_moved_jobs() {
        let dir = tempdir().unwrap();
        let coordinator = QueueCoordinator::new(dir.path()).unwrap();
        let filings = vec![PathBuf::from("/data/a.txt")];
        coordinator.create_jobs(&filings, true, 1000.0).unwrap();

        let pending_file = coordinator.pending_dir().join("a.json");
        let completed_file = coordinator.completed_dir().join("a.json");
        std::fs::rename(&pending_file, &completed_file).unwrap();

        let status = coordinator.status().unwrap();
        assert!(status.is_drained());
        assert_eq!(status.completed, 1);
        assert_eq!(status.progress_percent(), 100.0);
    }

    #[test]
    fn aggregate_results_sums_completed_job_stats() {
        let dir = tempdir().unwrap();
        let coordinator = QueueCoordinator::new(dir.path()).unwrap();
        let mut job = JobDescriptor::new(PathBuf::from("/data/a.txt"), true, 1000.0);
        job.stats = Some(FilingStats { companies: 1, people: 2, events: 1, relationships: 3, ownership_unresolved: 0 });
        let body = serde_json::to_string(&job).unwrap();
        std::fs::write(coordinator.completed_dir().join("a.json"), body).unwrap();

        let total = coordinator.aggregate_results().unwrap();
        assert_eq!(total.companies, 1);
        assert_eq!(total.people, 2);
    }
}
