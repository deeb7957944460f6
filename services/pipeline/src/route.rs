//! Router: decides which destination table receives which rows.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::normalize::NormalizedRow;

/// Longest identifier the warehouse accepts, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Default prefix for per-country tables.
pub const DEFAULT_TABLE_PREFIX: &str = "Table_";

/// Default single destination for staging loads.
pub const DEFAULT_STAGING_TABLE: &str = "Staging_Customers";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,

    #[error("character {0:?} is not allowed in an identifier")]
    UnsafeCharacter(char),

    #[error("identifier must start with a letter or underscore")]
    BadStart,

    #[error("identifier is {0} bytes long, the limit is {max}", max = MAX_IDENTIFIER_LEN)]
    TooLong(usize),

    #[error("identifier {table} is already used by country '{other}'")]
    Collision { table: String, other: String },
}

/// A destination table name that is safe to splice into SQL as a quoted identifier.
///
/// Only ASCII letters, digits and `_` are ever admitted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: &str) -> std::result::Result<Self, IdentifierError> {
        let first = name.chars().next().ok_or(IdentifierError::Empty)?;
        if let Some(c) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(IdentifierError::UnsafeCharacter(c));
        }
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(IdentifierError::BadStart);
        }
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong(name.len()));
        }
        Ok(Self(name.to_string()))
    }

    /// Derive a per-country table name.
    ///
    /// ASCII alphanumerics are kept; space, `-`, `.` and `'` become `_` (runs collapsed,
    /// ends trimmed). Any other character rejects the key.
    pub fn for_country(prefix: &str, key: &str) -> std::result::Result<Self, IdentifierError> {
        let mut suffix = String::with_capacity(key.len());
        for c in key.chars() {
            match c {
                c if c.is_ascii_alphanumeric() => suffix.push(c),
                ' ' | '-' | '.' | '\'' => {
                    if !suffix.is_empty() && !suffix.ends_with('_') {
                        suffix.push('_');
                    }
                }
                other => return Err(IdentifierError::UnsafeCharacter(other)),
            }
        }
        let suffix = suffix.trim_end_matches('_');
        if suffix.is_empty() {
            return Err(IdentifierError::Empty);
        }
        Self::new(&format!("{}{}", prefix, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rows bound for one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub destination: TableName,
    /// Grouping key; `None` for the fixed staging destination.
    pub key: Option<String>,
    pub rows: Vec<NormalizedRow>,
}

impl Batch {
    pub fn rows_with_missing_dates(&self) -> usize {
        self.rows.iter().filter(|r| r.has_missing_date()).count()
    }
}

/// A country group that could not be given a safe destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedGroup {
    pub key: String,
    pub reason: IdentifierError,
    pub rows: Vec<NormalizedRow>,
}

/// Router output. Every input row lands in exactly one batch or rejected group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePlan {
    pub batches: Vec<Batch>,
    pub rejected: Vec<RejectedGroup>,
}

impl RoutePlan {
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(|b| b.rows.len()).sum::<usize>()
            + self.rejected.iter().map(|g| g.rows.len()).sum::<usize>()
    }
}

/// Routing strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// One batch per distinct canonical country, into `<prefix><Country>`.
    PerCountry { prefix: String },
    /// Everything into one table.
    Fixed { table: TableName },
}

impl Routing {
    pub fn per_country(prefix: impl Into<String>) -> Self {
        Routing::PerCountry {
            prefix: prefix.into(),
        }
    }

    pub fn fixed(table: &str) -> Result<Self> {
        let table = TableName::new(table).map_err(|reason| PipelineError::InvalidTableName {
            name: table.to_string(),
            reason,
        })?;
        Ok(Routing::Fixed { table })
    }

    pub fn route(&self, rows: Vec<NormalizedRow>) -> RoutePlan {
        match self {
            Routing::PerCountry { prefix } => route_per_country(prefix, rows),
            Routing::Fixed { table } => {
                info!(table = %table, rows = rows.len(), "routing to single destination");
                RoutePlan {
                    batches: vec![Batch {
                        destination: table.clone(),
                        key: None,
                        rows,
                    }],
                    rejected: Vec::new(),
                }
            }
        }
    }
}

fn route_per_country(prefix: &str, rows: Vec<NormalizedRow>) -> RoutePlan {
    // BTreeMap for deterministic batch order
    let mut groups: BTreeMap<String, Vec<NormalizedRow>> = BTreeMap::new();
    let mut keyless = Vec::new();
    for row in rows {
        match row.country.clone() {
            Some(key) => groups.entry(key).or_default().push(row),
            None => keyless.push(row),
        }
    }

    let mut plan = RoutePlan::default();
    if !keyless.is_empty() {
        plan.rejected.push(RejectedGroup {
            key: String::new(),
            reason: IdentifierError::Empty,
            rows: keyless,
        });
    }

    let mut claimed: BTreeMap<TableName, String> = BTreeMap::new();
    for (key, rows) in groups {
        let derived = TableName::for_country(prefix, &key).and_then(|table| {
            match claimed.get(&table) {
                Some(other) => Err(IdentifierError::Collision {
                    table: table.to_string(),
                    other: other.clone(),
                }),
                None => Ok(table),
            }
        });

        match derived {
            Ok(table) => {
                claimed.insert(table.clone(), key.clone());
                plan.batches.push(Batch {
                    destination: table,
                    key: Some(key),
                    rows,
                });
            }
            Err(reason) => {
                warn!(country = %key, %reason, rows = rows.len(), "country cannot be routed");
                plan.rejected.push(RejectedGroup { key, reason, rows });
            }
        }
    }

    info!(
        batches = plan.batches.len(),
        rejected = plan.rejected.len(),
        "routed rows by country"
    );
    plan
}
