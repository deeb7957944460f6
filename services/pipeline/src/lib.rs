//! Hospital customer record pipeline.
//!
//! Takes a `|`-delimited customer extract and turns it into named batches ready for a
//! warehouse loader:
//!
//! file → [`parse`] → [`filter`] → [`normalize`] → [`route`] → batches
//!
//! Each stage fully materializes its output and hands it to the next by value. Nothing in
//! this crate touches the network; loading belongs to the caller.

pub mod error;
pub mod filter;
pub mod normalize;
pub mod parse;
pub mod report;
pub mod route;
pub mod schema;
pub mod source;

use std::path::Path;

use tracing::{info, warn};

pub use error::{PipelineError, Result};
pub use filter::{retain_detail, DetailRow, DETAIL_MARKER};
pub use normalize::{normalize, CountryRule, DateFormat, NormalizedRow};
pub use parse::{parse, ParsedRow, ParsedTable};
pub use report::{Report, Warning, WarningTally};
pub use route::{Batch, IdentifierError, RejectedGroup, RoutePlan, Routing, TableName};
pub use schema::{ColumnPolicy, ColumnShape, Field};
pub use source::SourceText;

/// How a run treats the column count and where rows go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub column_policy: ColumnPolicy,
    pub routing: Routing,
}

impl PipelineOptions {
    /// Per-country tables, tolerant of a short or long header.
    pub fn per_country(prefix: impl Into<String>) -> Self {
        Self {
            column_policy: ColumnPolicy::Lenient,
            routing: Routing::per_country(prefix),
        }
    }

    /// One staging table, exact column count required.
    pub fn staging(table: &str) -> Result<Self> {
        Ok(Self {
            column_policy: ColumnPolicy::Strict,
            routing: Routing::fixed(table)?,
        })
    }

    /// Per-country routing needs a country on every row; staging keeps whatever is there.
    pub fn country_rule(&self) -> CountryRule {
        match self.routing {
            Routing::PerCountry { .. } => CountryRule::Require,
            Routing::Fixed { .. } => CountryRule::PassThrough,
        }
    }
}

/// Batches ready for loading plus everything worth reporting about how they were built.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub plan: RoutePlan,
    pub report: Report,
}

/// Read a file and run it through every stage.
pub fn prepare_file(path: &Path, options: &PipelineOptions) -> Result<Prepared> {
    let source = SourceText::read(path)?;
    prepare(&source, options)
}

/// Run already-read source text through every stage.
pub fn prepare(source: &SourceText, options: &PipelineOptions) -> Result<Prepared> {
    let table = parse(source, options.column_policy)?;
    let data_lines = table.rows.len();
    let mut warnings = table.warnings;

    let detail = retain_detail(table.rows);
    let detail_rows = detail.len();
    info!(data_lines, detail_rows, "filtered detail records");

    let normalized = normalize(detail, options.country_rule());
    let normalized_rows = normalized.rows.len();

    let plan = options.routing.route(normalized.rows);

    for group in &plan.rejected {
        warnings.push(Warning::UnroutableGroup {
            key: group.key.clone(),
            reason: group.reason.to_string(),
        });
    }
    for batch in &plan.batches {
        let rows = batch.rows_with_missing_dates();
        if rows > 0 {
            warn!(
                destination = %batch.destination,
                rows,
                "some date fields could not be converted and are set to missing"
            );
            warnings.push(Warning::MissingDates {
                destination: batch.destination.to_string(),
                rows,
            });
        }
    }

    Ok(Prepared {
        plan,
        report: Report {
            content_hash: source.content_hash.clone(),
            data_lines,
            detail_rows,
            dropped_blank_country: normalized.dropped_blank_country,
            normalized_rows,
            warnings,
        },
    })
}
