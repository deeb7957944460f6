//! Loading a route plan batch by batch.

use pipeline::RoutePlan;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::warehouse::Loader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Ok,
    Failed,
    /// Never sent: no safe table name could be derived.
    Rejected,
    /// Dry run only.
    Planned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub table: Option<String>,
    pub country: Option<String>,
    pub rows: usize,
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    pub batches: Vec<BatchOutcome>,
}

impl LoadOutcome {
    /// What would be loaded, without touching the warehouse.
    pub fn planned(plan: &RoutePlan) -> Self {
        let mut outcome = Self::default();
        for batch in &plan.batches {
            outcome.batches.push(BatchOutcome {
                table: Some(batch.destination.to_string()),
                country: batch.key.clone(),
                rows: batch.rows.len(),
                status: BatchStatus::Planned,
                error: None,
            });
        }
        outcome.push_rejected(plan);
        outcome
    }

    fn push_rejected(&mut self, plan: &RoutePlan) {
        for group in &plan.rejected {
            self.batches.push(BatchOutcome {
                table: None,
                country: Some(group.key.clone()),
                rows: group.rows.len(),
                status: BatchStatus::Rejected,
                error: Some(group.reason.to_string()),
            });
        }
    }

    pub fn count(&self, status: BatchStatus) -> usize {
        self.batches.iter().filter(|b| b.status == status).count()
    }

    pub fn loaded_rows(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.status == BatchStatus::Ok)
            .map(|b| b.rows)
            .sum()
    }

    /// True when nothing failed or was rejected.
    pub fn is_complete(&self) -> bool {
        self.count(BatchStatus::Failed) == 0 && self.count(BatchStatus::Rejected) == 0
    }
}

/// Append every batch in order. A failing batch is recorded and the rest still load.
pub async fn load_plan<L: Loader>(loader: &L, plan: &RoutePlan) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();

    for batch in &plan.batches {
        let table = batch.destination.to_string();
        match loader.append(&batch.destination, &batch.rows).await {
            Ok(written) => {
                info!(table = %table, rows = written, "data loaded successfully");
                outcome.batches.push(BatchOutcome {
                    table: Some(table),
                    country: batch.key.clone(),
                    rows: batch.rows.len(),
                    status: BatchStatus::Ok,
                    error: None,
                });
            }
            Err(e) => {
                error!(table = %table, error = %format!("{:#}", e), "error loading data");
                outcome.batches.push(BatchOutcome {
                    table: Some(table),
                    country: batch.key.clone(),
                    rows: batch.rows.len(),
                    status: BatchStatus::Failed,
                    error: Some(format!("{:#}", e)),
                });
            }
        }
    }

    for group in &plan.rejected {
        warn!(country = %group.key, rows = group.rows.len(), reason = %group.reason, "skipping unroutable rows");
    }
    outcome.push_rejected(plan);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pipeline::{prepare, NormalizedRow, PipelineOptions, SourceText, TableName};
    use std::sync::Mutex;

    /// Records appends and fails for the configured tables.
    #[derive(Default)]
    struct RecordingLoader {
        fail_on: Vec<&'static str>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl Loader for RecordingLoader {
        async fn append(&self, table: &TableName, rows: &[NormalizedRow]) -> Result<u64> {
            self.calls
                .lock()
                .unwrap()
                .push((table.to_string(), rows.len()));
            if self.fail_on.iter().any(|t| *t == table.as_str()) {
                anyhow::bail!("relation \"{}\" does not exist", table);
            }
            Ok(rows.len() as u64)
        }
    }

    fn plan(lines: &[&str], options: &PipelineOptions) -> RoutePlan {
        let mut content = String::from("h|h|h|h|h|h|h|h|h|h|h|h");
        for line in lines {
            content.push('\n');
            content.push_str(line);
        }
        prepare(&SourceText::from(content.as_str()), options)
            .unwrap()
            .plan
    }

    fn three_countries() -> RoutePlan {
        plan(
            &[
                "D|a|1|20200101|20200102|MVD|Paul|SA|India|06|01011990|A",
                "D|b|2|20200101|20200102|MVD|Paul|SA|Chile|06|01011990|A",
                "D|c|3|20200101|20200102|MVD|Paul|SA|usa|06|01011990|A",
                "D|d|4|20200101|20200102|MVD|Paul|SA|india|06|01011990|A",
            ],
            &PipelineOptions::per_country("Table_"),
        )
    }

    #[tokio::test]
    async fn test_loads_every_batch() {
        let loader = RecordingLoader::default();
        let outcome = load_plan(&loader, &three_countries()).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.count(BatchStatus::Ok), 3);
        assert_eq!(outcome.loaded_rows(), 4);
        let calls = loader.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("Table_Chile".to_string(), 1),
                ("Table_India".to_string(), 2),
                ("Table_Usa".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_the_rest() {
        let loader = RecordingLoader {
            fail_on: vec!["Table_India"],
            ..Default::default()
        };
        let outcome = load_plan(&loader, &three_countries()).await;

        assert_eq!(loader.calls.lock().unwrap().len(), 3);
        assert_eq!(outcome.count(BatchStatus::Ok), 2);
        assert_eq!(outcome.count(BatchStatus::Failed), 1);
        assert_eq!(outcome.loaded_rows(), 2);
        let failed = &outcome.batches[1];
        assert_eq!(failed.table.as_deref(), Some("Table_India"));
        assert!(failed
            .error
            .as_deref()
            .unwrap()
            .contains("does not exist"));
        assert!(!outcome.is_complete());
    }

    #[tokio::test]
    async fn test_rejected_groups_never_reach_the_loader() {
        let plan = plan(
            &[
                "D|a|1|20200101|20200102|MVD|Paul|SA|India|06|01011990|A",
                "D|b|2|20200101|20200102|MVD|Paul|SA|Bad;Name|06|01011990|A",
            ],
            &PipelineOptions::per_country("Table_"),
        );
        let loader = RecordingLoader::default();
        let outcome = load_plan(&loader, &plan).await;

        assert_eq!(loader.calls.lock().unwrap().len(), 1);
        assert_eq!(outcome.count(BatchStatus::Rejected), 1);
        assert_eq!(outcome.batches[1].table, None);
        assert_eq!(outcome.batches[1].country.as_deref(), Some("Bad;Name"));
    }

    #[tokio::test]
    async fn test_staging_single_batch() {
        let plan = plan(
            &[
                "D|a|1|20200101|20200102|MVD|Paul|SA|India|06|01011990|A",
                "D|b|2|20200101|20200102|MVD|Paul|SA||06|01011990|A",
            ],
            &PipelineOptions::staging("Staging_Customers").unwrap(),
        );
        let loader = RecordingLoader {
            fail_on: vec!["Staging_Customers"],
            ..Default::default()
        };
        let outcome = load_plan(&loader, &plan).await;

        assert_eq!(outcome.batches.len(), 1);
        assert_eq!(outcome.batches[0].status, BatchStatus::Failed);
        assert_eq!(outcome.batches[0].rows, 2);
    }

    #[test]
    fn test_planned_outcome() {
        let outcome = LoadOutcome::planned(&three_countries());
        assert_eq!(outcome.count(BatchStatus::Planned), 3);
        assert_eq!(outcome.loaded_rows(), 0);
    }
}
