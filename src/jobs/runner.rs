//! Batch driver
//!
//! Persists a batch before the first tick and its sandbox after every tick,
//! so an interrupted run picks up at the stored cursor. Only failures of the
//! driver itself (persistence) mark a batch as failed; item failures live in
//! the counters.

use anyhow::{Context, Result};
use tracing::{error, info};

use super::reconcile::{JobItem, ReconciliationJob, ResultCounters, Sandbox, ScopePolicy};
use super::report::JobReporter;
use crate::db::sqlite_helpers::{from_json, to_json};
use crate::db::{BatchRecord, BatchRepository, BatchStatus, CreateBatch};
use crate::services::resolver::ResolverKind;

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: String,
    pub success: bool,
    pub counters: ResultCounters,
    pub message: String,
}

/// A batch loaded back from the database
#[derive(Debug, Clone)]
pub struct StoredBatch {
    pub record: BatchRecord,
    pub scope: ScopePolicy,
    pub resolver: ResolverKind,
    pub items: Vec<JobItem>,
    pub sandbox: Sandbox,
}

pub struct BatchRunner {
    batches: BatchRepository,
}

impl BatchRunner {
    pub fn new(batches: BatchRepository) -> Self {
        Self { batches }
    }

    /// Persist a new batch for `items` and drive it to completion
    pub async fn start(&self, job: &ReconciliationJob, items: Vec<JobItem>) -> Result<BatchReport> {
        let sandbox = Sandbox::default();
        let batch = self
            .batches
            .create(CreateBatch {
                scope: job.scope().as_str().to_string(),
                style: job.style().name.clone(),
                resolver: job.resolver_kind().as_str().to_string(),
                items: to_json(&items)?,
                sandbox: to_json(&sandbox)?,
            })
            .await
            .context("Failed to create batch")?;

        info!(
            batch_id = %batch.id,
            scope = %job.scope(),
            style = %job.style().name,
            items = items.len(),
            "Batch started"
        );

        Ok(self.drive(job, &batch.id, &items, sandbox).await)
    }

    /// Load a stored batch with its items and sandbox
    pub async fn load(&self, batch_id: &str) -> Result<StoredBatch> {
        let record = self
            .batches
            .get(batch_id)
            .await?
            .with_context(|| format!("Batch {} not found", batch_id))?;

        Ok(StoredBatch {
            scope: record.scope.parse()?,
            resolver: record.resolver.parse()?,
            items: from_json(&record.items).context("Stored batch items are unreadable")?,
            sandbox: from_json(&record.sandbox).context("Stored batch sandbox is unreadable")?,
            record,
        })
    }

    /// Continue a stored batch from its persisted cursor
    pub async fn resume(&self, job: &ReconciliationJob, batch: StoredBatch) -> Result<BatchReport> {
        match batch.record.status {
            BatchStatus::Failed => {
                self.batches
                    .set_status(&batch.record.id, BatchStatus::Running)
                    .await?;
            }
            BatchStatus::Finished => {
                info!(batch_id = %batch.record.id, "Batch already finished");
            }
            BatchStatus::Running => {}
        }

        info!(
            batch_id = %batch.record.id,
            progress = batch.sandbox.cursor.map(|c| c.progress).unwrap_or(0),
            items = batch.items.len(),
            "Batch resumed"
        );

        Ok(self
            .drive(job, &batch.record.id, &batch.items, batch.sandbox)
            .await)
    }

    async fn drive(
        &self,
        job: &ReconciliationJob,
        batch_id: &str,
        items: &[JobItem],
        mut sandbox: Sandbox,
    ) -> BatchReport {
        let mut success = true;

        loop {
            let tick = job.step(items, sandbox).await;
            sandbox = tick.sandbox;

            // Counts handled items: the first tick reads "1 of N"
            if let Some(cursor) = sandbox.cursor {
                info!(
                    batch_id = %batch_id,
                    progress = cursor.progress,
                    max = cursor.max,
                    fraction = tick.fraction,
                    "Processing {} of {} videos.",
                    cursor.progress,
                    cursor.max
                );
            }

            if let Err(e) = self.persist(batch_id, &sandbox).await {
                error!(batch_id = %batch_id, error = %format!("{:#}", e), "Failed to persist batch progress");
                success = false;
                break;
            }

            if tick.done {
                break;
            }
        }

        let status = if success {
            BatchStatus::Finished
        } else {
            BatchStatus::Failed
        };
        if let Err(e) = self.batches.set_status(batch_id, status).await {
            error!(batch_id = %batch_id, error = %e, "Failed to update batch status");
            success = false;
        }

        let message = JobReporter::summarize(success, &sandbox.results);
        info!(
            batch_id = %batch_id,
            processed = sandbox.results.processed,
            skipped = sandbox.results.skipped,
            errored = sandbox.results.errored,
            "{}",
            message
        );

        BatchReport {
            batch_id: batch_id.to_string(),
            success,
            counters: sandbox.results,
            message,
        }
    }

    async fn persist(&self, batch_id: &str, sandbox: &Sandbox) -> Result<()> {
        let json = to_json(sandbox)?;
        self.batches.save_sandbox(batch_id, &json).await
    }
}
