//! The fixed positional schema of the customer extract.

use serde::Serialize;
use std::fmt;

/// One column of the extract. The Nth raw value maps to the Nth field, whatever it contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Field {
    RecordType,
    CustomerName,
    CustomerID,
    CustomerOpenDate,
    LastConsultedDate,
    VaccinationType,
    Doctor,
    State,
    Country,
    PostCode,
    DateOfBirth,
    ActiveCustomer,
}

impl Field {
    /// All fields in positional order.
    pub const ALL: [Field; 12] = [
        Field::RecordType,
        Field::CustomerName,
        Field::CustomerID,
        Field::CustomerOpenDate,
        Field::LastConsultedDate,
        Field::VaccinationType,
        Field::Doctor,
        Field::State,
        Field::Country,
        Field::PostCode,
        Field::DateOfBirth,
        Field::ActiveCustomer,
    ];

    /// Column name, also used as the warehouse column name.
    pub fn name(self) -> &'static str {
        match self {
            Field::RecordType => "RecordType",
            Field::CustomerName => "CustomerName",
            Field::CustomerID => "CustomerID",
            Field::CustomerOpenDate => "CustomerOpenDate",
            Field::LastConsultedDate => "LastConsultedDate",
            Field::VaccinationType => "VaccinationType",
            Field::Doctor => "Doctor",
            Field::State => "State",
            Field::Country => "Country",
            Field::PostCode => "PostCode",
            Field::DateOfBirth => "DateOfBirth",
            Field::ActiveCustomer => "ActiveCustomer",
        }
    }

    /// Zero-based position in a raw line.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of columns every line is expected to carry.
pub const EXPECTED_COLUMNS: usize = Field::ALL.len();

/// How the discovered column count compares to the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnShape {
    ExactMatch,
    FewerThanExpected(usize),
    MoreThanExpected(usize),
}

impl ColumnShape {
    pub fn classify(found: usize) -> Self {
        match found.cmp(&EXPECTED_COLUMNS) {
            std::cmp::Ordering::Equal => ColumnShape::ExactMatch,
            std::cmp::Ordering::Less => ColumnShape::FewerThanExpected(found),
            std::cmp::Ordering::Greater => ColumnShape::MoreThanExpected(found),
        }
    }

    /// Number of columns actually discovered.
    pub fn found(self) -> usize {
        match self {
            ColumnShape::ExactMatch => EXPECTED_COLUMNS,
            ColumnShape::FewerThanExpected(n) | ColumnShape::MoreThanExpected(n) => n,
        }
    }

    /// Schema fields that can be labeled under this shape.
    ///
    /// Extra columns past the schema are ignored; missing ones are simply not labeled.
    pub fn labeled_fields(self) -> &'static [Field] {
        &Field::ALL[..self.found().min(EXPECTED_COLUMNS)]
    }
}

impl fmt::Display for ColumnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnShape::ExactMatch => write!(f, "{} columns as expected", EXPECTED_COLUMNS),
            ColumnShape::FewerThanExpected(n) => write!(
                f,
                "fewer columns than expected (expected {}, got {})",
                EXPECTED_COLUMNS, n
            ),
            ColumnShape::MoreThanExpected(n) => write!(
                f,
                "more columns than expected (expected {}, got {})",
                EXPECTED_COLUMNS, n
            ),
        }
    }
}

/// What to do when the header does not carry exactly [`EXPECTED_COLUMNS`] columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnPolicy {
    /// Reject the whole file.
    #[default]
    Strict,
    /// Warn and label whatever columns were discovered.
    Lenient,
}
