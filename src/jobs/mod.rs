//! Batch jobs

pub mod reconcile;
pub mod report;
pub mod runner;

pub use reconcile::{
    ItemOutcome, JobItem, JobStatus, PLACEHOLDER_FILENAME, ProgressCursor, ReconciliationJob,
    ResultCounters, Sandbox, ScopePolicy, Tick,
};
pub use report::JobReporter;
pub use runner::{BatchReport, BatchRunner, StoredBatch};
