//! Non-fatal diagnostics and per-run counts.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::schema::ColumnShape;

/// Something the operator should see that does not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    InvalidUtf8,
    ColumnCount {
        shape: ColumnShape,
    },
    MalformedLine {
        line: u64,
        found: usize,
        expected: usize,
    },
    /// Some rows of a batch carry at least one missing date. Rows are counted, not named.
    MissingDates {
        destination: String,
        rows: usize,
    },
    UnroutableGroup {
        key: String,
        reason: String,
    },
}

impl Warning {
    /// Stable name of the variant, as used in the serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Warning::InvalidUtf8 => "invalid_utf8",
            Warning::ColumnCount { .. } => "column_count",
            Warning::MalformedLine { .. } => "malformed_line",
            Warning::MissingDates { .. } => "missing_dates",
            Warning::UnroutableGroup { .. } => "unroutable_group",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::InvalidUtf8 => write!(f, "source contains invalid UTF-8"),
            Warning::ColumnCount { shape } => write!(f, "{}", shape),
            Warning::MalformedLine {
                line,
                found,
                expected,
            } => write!(
                f,
                "line {}: expected {} fields, found {}",
                line, expected, found
            ),
            Warning::MissingDates { destination, rows } => write!(
                f,
                "{}: {} row(s) have date fields that could not be converted",
                destination, rows
            ),
            Warning::UnroutableGroup { key, reason } => {
                write!(f, "country '{}' cannot be routed: {}", key, reason)
            }
        }
    }
}

/// What happened to the rows between the file and the batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub content_hash: String,
    pub data_lines: usize,
    pub detail_rows: usize,
    pub dropped_blank_country: usize,
    pub normalized_rows: usize,
    pub warnings: Vec<Warning>,
}

/// How many warnings of one kind a run produced, with the first one as an example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningTally<'a> {
    pub count: usize,
    pub first: &'a Warning,
}

impl Report {
    /// Warnings grouped by kind, in kind order.
    pub fn tally_warnings(&self) -> BTreeMap<&'static str, WarningTally<'_>> {
        let mut tally: BTreeMap<&'static str, WarningTally<'_>> = BTreeMap::new();
        for warning in &self.warnings {
            tally
                .entry(warning.kind())
                .and_modify(|t| t.count += 1)
                .or_insert(WarningTally {
                    count: 1,
                    first: warning,
                });
        }
        tally
    }

    pub fn malformed_lines(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, Warning::MalformedLine { .. }))
            .count()
    }
}
