//! Detail filter: keeps `D` records, drops headers and summaries.

use std::ops::Deref;

use crate::parse::ParsedRow;
use crate::schema::Field;

/// Literal record type marking a detail line.
pub const DETAIL_MARKER: &str = "D";

/// A parsed row known to be a detail record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRow(ParsedRow);

impl DetailRow {
    pub fn into_parsed(self) -> ParsedRow {
        self.0
    }
}

impl Deref for DetailRow {
    type Target = ParsedRow;

    fn deref(&self) -> &ParsedRow {
        &self.0
    }
}

pub fn is_detail(row: &ParsedRow) -> bool {
    row.get(Field::RecordType) == Some(DETAIL_MARKER)
}

/// Order-preserving; an empty result is valid.
pub fn retain_detail(rows: Vec<ParsedRow>) -> Vec<DetailRow> {
    rows.into_iter().filter(is_detail).map(DetailRow).collect()
}
