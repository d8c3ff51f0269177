//! Node supervision and job orchestration.
//!
//! This module contains:
//! - Process: pid file and OS-level liveness
//! - Supervisor: node process lifecycle and status observation
//! - Tuning: the tokenize/merge/optimize/apply pipeline
//! - Imports: domain management and import-job polling

pub mod imports;
pub mod process;
pub mod supervisor;
pub mod tuning;

// Re-export commonly used types
pub use imports::{DomainJobs, DEFAULT_REFRESH};
pub use process::PidFile;
pub use supervisor::ClusterNode;
pub use tuning::{TuningOptions, TuningOrchestrator, DEV_FOLDER_NAME};
