use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pipeline::Report;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::load::{BatchStatus, LoadOutcome};

/// Everything an operator needs to audit one run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source: String,
    pub mode: &'static str,
    pub dry_run: bool,
    pub report: Report,
    pub outcome: LoadOutcome,
}

impl RunSummary {
    /// One line per warning kind, then the totals. Stages log the individual warnings.
    pub fn log(&self) {
        for (kind, tally) in self.report.tally_warnings() {
            warn!(kind, count = tally.count, example = %tally.first, "warnings recorded");
        }
        info!(
            detail_rows = self.report.detail_rows,
            dropped_blank_country = self.report.dropped_blank_country,
            malformed_lines = self.report.malformed_lines(),
            loaded_rows = self.outcome.loaded_rows(),
            ok = self.outcome.count(BatchStatus::Ok),
            failed = self.outcome.count(BatchStatus::Failed),
            rejected = self.outcome.count(BatchStatus::Rejected),
            "run finished"
        );
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run summary")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write run summary to {}", path.display()))?;
        info!(path = %path.display(), "run summary written");
        Ok(())
    }
}
