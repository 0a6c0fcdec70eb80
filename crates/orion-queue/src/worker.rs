//! A worker claims the lexicographically-first pending job by renaming it
//! into `processing/<worker_id>_<job_name>` — the rename is atomic on a
//! local filesystem, so two workers racing the same file never both win.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use orion_core::OrionResult;
use orion_graph::{GraphLoader, GraphStore};

use crate::coordinator::QueueCoordinator;
use crate::descriptor::JobDescriptor;

const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct FilingWorker<S: GraphStore> {
    worker_id: String,
    coordinator: QueueCoordinator,
    loader: GraphLoader<S>,
    processed_count: u32,
}

impl<S: GraphStore> FilingWorker<S> {
    pub fn new(worker_id: impl Into<String>, coordinator: QueueCoordinator, loader: GraphLoader<S>) -> Self {
        Self { worker_id: worker_id.into(), coordinator, loader, processed_count: 0 }
    }

    /// Claim the oldest pending job and move it into `processing/` under
    /// this worker's name. Returns `Ok(None)` when the queue is empty.
    fn claim_next_job(&self) -> OrionResult<Option<PathBuf>> {
        let mut pending: Vec<PathBuf> = std::fs::read_dir(self.coordinator.pending_dir())
            .map_err(|e| orion_core::OrionError::Queue(e.to_string()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        pending.sort();

        let Some(job_file) = pending.into_iter().next() else { return Ok(None) };
        let file_name = job_file.file_name().expect("job file has a name");
        let processing_file = self.coordinator.processing_dir().join(format!("{}_{}", self.worker_id, file_name.to_string_lossy()));

        match std::fs::rename(&job_file, &processing_file) {
            Ok(()) => Ok(Some(processing_file)),
            Err(e) => {
                tracing::warn!(worker_id = %self.worker_id, error = %e, "lost race claiming job, another worker took it");
                Ok(None)
            }
        }
    }

    fn mark_complete(&self, job_file: &Path, success: bool) -> OrionResult<()> {
        let target_dir = if success { self.coordinator.completed_dir() } else { self.coordinator.failed_dir() };
        let file_name = job_file.file_name().expect("job file has a name");
        std::fs::rename(job_file, target_dir.join(file_name))
            .map_err(|e| orion_core::OrionError::Queue(format!("failed to move job to terminal state: {e}")))
    }

    async fn process_job(&mut self, job_file: &Path, completed_at: f64) -> OrionResult<()> {
        let content = std::fs::read_to_string(job_file)
            .map_err(|e| orion_core::OrionError::Queue(format!("failed to read job file: {e}")))?;
        let mut job: JobDescriptor =
            serde_json::from_str(&content).map_err(|e| orion_core::OrionError::Queue(format!("malformed job file: {e}")))?;

        if !job.filing_path.exists() {
            tracing::warn!(worker_id = %self.worker_id, filing = %job.filing_path.display(), "filing not found, failing job");
            return Err(orion_core::OrionError::NotFound(job.filing_path.display().to_string()));
        }

        tracing::info!(worker_id = %self.worker_id, filing = %job.filing_name, "processing job");
        let record = orion_parser::parse_filing(&job.filing_path);
        let stats = self.loader.process_filing(&record).await;

        job.stats = Some(stats);
        job.worker_id = Some(self.worker_id.clone());
        job.completed_at = Some(completed_at);
        let body = serde_json::to_string_pretty(&job)
            .map_err(|e| orion_core::OrionError::Queue(format!("failed to serialize job result: {e}")))?;
        std::fs::write(job_file, body).map_err(|e| orion_core::OrionError::Queue(format!("failed to write job result: {e}")))?;

        tracing::info!(
            worker_id = %self.worker_id,
            filing = %job.filing_name,
            people = stats.people,
            relationships = stats.relationships,
            "completed job"
        );
        Ok(())
    }

    /// Run until `running` goes false (flipped by a signal handler the
    /// caller wires up) or the queue stays empty between polls. `now_fn`
    /// supplies the completion timestamp — injected so tests don't need a
    /// real clock.
    pub async fn run(&mut self, running: Arc<AtomicBool>, now_fn: impl Fn() -> f64) {
        tracing::info!(worker_id = %self.worker_id, "worker started, waiting for jobs");
        while running.load(Ordering::SeqCst) {
            match self.claim_next_job() {
                Ok(Some(job_file)) => {
                    let completed_at = now_fn();
                    let success = self.process_job(&job_file, completed_at).await.is_ok();
                    if let Err(e) = self.mark_complete(&job_file, success) {
                        tracing::error!(worker_id = %self.worker_id, error = %e, "failed to finalize job state");
                    }
                    self.processed_count += 1;
                }
                Ok(None) => {
                    tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                }
                Err(e) => {
                    tracing::error!(worker_id = %self.worker_id, error = %e, "error polling queue");
                    tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                }
            }
        }
        tracing::info!(worker_id = %self.worker_id, processed = self.processed_count, "worker stopped");
    }

    pub fn processed_count(&self) -> u32 {
        self.processed_count
    }
}

/// Installs Ctrl-C and (on Unix) SIGTERM handlers that flip a shared flag,
/// so `run`'s loop exits after finishing its current job rather than being
/// killed mid-write.
pub fn install_shutdown_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    flag.store(false, Ordering::SeqCst);
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        tracing::info!("shutdown signal received, finishing current job");
        flag.store(false, Ordering::SeqCst);
    });
    running
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_graph::graph_store::fake::FakeGraphStore;
    use orion_graph::NameToCikIndex;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_filing(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "CONFORMED SUBMISSION TYPE:\t6-K\nCENTRAL INDEX KEY:\t0000123456\nCOMPANY CONFORMED NAME:\tAcme Holdings Inc\n<TEXT>\nHello\n</TEXT>"
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn claims_and_completes_a_single_job() {
        let queue_dir = tempdir().unwrap();
        let filings_dir = tempdir().unwrap();
        let filing_path = write_filing(filings_dir.path(), "acme.txt");

        let coordinator = QueueCoordinator::new(queue_dir.path()).unwrap();
        coordinator.create_jobs(&[filing_path], true, 1000.0).unwrap();

        let store = FakeGraphStore::new();
        let loader = GraphLoader::new(store, NameToCikIndex::new());
        let mut worker = FilingWorker::new("worker-1", coordinator, loader);

        let running = Arc::new(AtomicBool::new(true));
        let job_file = worker.claim_next_job().unwrap().expect("job should be claimable");
        worker.process_job(&job_file, 2000.0).await.unwrap();
        worker.mark_complete(&job_file, true).unwrap();

        assert_eq!(worker.processed_count(), 0);
        let status = worker.coordinator.status().unwrap();
        assert_eq!(status.completed, 1);
        assert_eq!(status.pending, 0);
        running.store(false, Ordering::SeqCst);
    }

    #[test]
    fn empty_queue_claims_nothing() {
        let queue_dir = tempdir().unwrap();
        let coordinator = QueueCoordinator::new(queue_dir.path()).unwrap();
        let store = FakeGraphStore::new();
        let loader = GraphLoader::new(store, NameToCikIndex::new());
        let worker = FilingWorker::new("worker-1", coordinator, loader);

        assert!(worker.claim_next_job().unwrap().is_none());
    }
}
