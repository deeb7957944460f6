//! Loader Service - Loads hospital customer extracts into warehouse tables
//!
//! Responsibilities:
//! - Read and validate the `|`-delimited customer extract
//! - Keep detail records, normalize countries and dates
//! - Append rows per country (`Table_<Country>`) or into one staging table
//! - Report warnings and per-table outcomes
//!
//! Usage:
//!   # Per-country tables:
//!   cargo run --bin loader -- --file data/hospital_data.txt
//!
//!   # Single staging table, exact 12 columns required:
//!   cargo run --bin loader -- --mode staging --staging-table Staging_Customers
//!
//!   # Show the plan without connecting:
//!   cargo run --bin loader -- --dry-run
//!
//! Environment (read from `.env` when present):
//!   WAREHOUSE_ACCOUNT   host or host:port (required)
//!   WAREHOUSE_USER      (required)
//!   WAREHOUSE_PASSWORD  (required)
//!   WAREHOUSE_DATABASE  (required)
//!   WAREHOUSE_SCHEMA    target schema, default `public`
//!   WAREHOUSE_NAME      informational only, sent as the session application name
//!   WAREHOUSE_ROLE      role set on every connection

mod config;
mod load;
mod summary;
mod warehouse;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use pipeline::route::{DEFAULT_STAGING_TABLE, DEFAULT_TABLE_PREFIX};
use pipeline::{ColumnPolicy, PipelineOptions, TableName};
use std::path::PathBuf;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use crate::config::WarehouseConfig;
use crate::load::{load_plan, BatchStatus, LoadOutcome};
use crate::summary::RunSummary;
use crate::warehouse::Warehouse;

#[derive(Parser, Debug)]
#[command(name = "loader", about = "Loads hospital customer extracts into warehouse tables")]
struct Args {
    /// Pipe-delimited extract to load
    #[arg(long, default_value = "data/hospital_data.txt")]
    file: PathBuf,

    /// Routing: one table per country, or one staging table
    #[arg(long, value_enum, default_value_t = Mode::Country)]
    mode: Mode,

    /// Prefix for per-country table names
    #[arg(long, default_value = DEFAULT_TABLE_PREFIX)]
    table_prefix: String,

    /// Destination table in staging mode
    #[arg(long, default_value = DEFAULT_STAGING_TABLE)]
    staging_table: String,

    /// Column count policy (default: lenient for country, strict for staging)
    #[arg(long, value_enum)]
    columns: Option<Columns>,

    /// Dry run - don't connect to the warehouse
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Write a JSON run summary to this path
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Country,
    Staging,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Country => "country",
            Mode::Staging => "staging",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Columns {
    Strict,
    Lenient,
}

impl From<Columns> for ColumnPolicy {
    fn from(columns: Columns) -> Self {
        match columns {
            Columns::Strict => ColumnPolicy::Strict,
            Columns::Lenient => ColumnPolicy::Lenient,
        }
    }
}

fn pipeline_options(args: &Args) -> Result<PipelineOptions> {
    let mut options = match args.mode {
        Mode::Country => {
            if !args.table_prefix.is_empty() {
                TableName::new(&args.table_prefix)
                    .with_context(|| format!("Invalid table prefix '{}'", args.table_prefix))?;
            }
            PipelineOptions::per_country(args.table_prefix.clone())
        }
        Mode::Staging => PipelineOptions::staging(&args.staging_table)?,
    };
    if let Some(columns) = args.columns {
        options.column_policy = columns.into();
    }
    Ok(options)
}

fn init_logging() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
}

async fn run(args: Args, run_id: Uuid) -> Result<()> {
    let started_at = Utc::now();
    let options = pipeline_options(&args)?;

    info!(file = %args.file.display(), mode = args.mode.as_str(), "preparing load");
    let prepared = pipeline::prepare_file(&args.file, &options)
        .with_context(|| format!("Error loading data from {}", args.file.display()))?;

    let outcome = if args.dry_run {
        for batch in &prepared.plan.batches {
            info!(table = %batch.destination, rows = batch.rows.len(), "dry run - would load");
        }
        LoadOutcome::planned(&prepared.plan)
    } else {
        let config = WarehouseConfig::from_env()?;
        let warehouse = Warehouse::connect(&config).await?;
        let outcome = load_plan(&warehouse, &prepared.plan).await;
        warehouse.close().await;
        outcome
    };

    let summary = RunSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        source: args.file.display().to_string(),
        mode: args.mode.as_str(),
        dry_run: args.dry_run,
        report: prepared.report,
        outcome,
    };
    summary.log();
    if let Some(path) = &args.summary {
        summary.write(path).await?;
    }

    check_exit(args.mode, &summary.outcome)
}

/// Staging has a single batch, so its failure is the run's failure. Per-country runs
/// succeed on partial loads; the summary carries the failed tables.
fn check_exit(mode: Mode, outcome: &LoadOutcome) -> Result<()> {
    if mode == Mode::Staging {
        if let Some(failed) = outcome
            .batches
            .iter()
            .find(|b| b.status == BatchStatus::Failed)
        {
            anyhow::bail!(
                "Staging load into {} failed: {}",
                failed.table.as_deref().unwrap_or_default(),
                failed.error.as_deref().unwrap_or_default()
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging();

    let run_id = Uuid::new_v4();
    run(args, run_id).instrument(info_span!("run", %run_id)).await
}
