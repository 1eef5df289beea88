//! Final batch summaries

use super::reconcile::ResultCounters;

pub struct JobReporter;

impl JobReporter {
    /// Operator-facing summary of a finished run
    pub fn summarize(success: bool, counters: &ResultCounters) -> String {
        if !success {
            return "Finished with an error.".to_string();
        }

        if counters.errored > 0 {
            format!(
                "Rebuilt {} thumbnails. Skipped {}. Errors on {} thumbnails. Check the error log for details.",
                counters.processed, counters.skipped, counters.errored
            )
        } else {
            format!(
                "Rebuilt {} thumbnails. Skipped {}.",
                counters.processed, counters.skipped
            )
        }
    }
}
