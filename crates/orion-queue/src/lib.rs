//! File-based distributed work queue: a coordinator seeds `pending/` with
//! one job per filing, and any number of workers drain it independently by
//! claiming jobs through an atomic rename.

pub mod coordinator;
pub mod descriptor;
pub mod worker;

pub use coordinator::{QueueCoordinator, QueueStatus};
pub use descriptor::JobDescriptor;
pub use worker::{install_shutdown_handler, FilingWorker};
