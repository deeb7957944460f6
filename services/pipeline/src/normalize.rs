//! Field normalizer: canonical country values and typed dates.
//!
//! A date that does not match its format becomes `None` and the row is kept. Only the
//! country rule of per-country routing ever drops a row.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::filter::DetailRow;
use crate::schema::Field;

/// Fixed 8-digit textual date layouts found in the extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `YYYYMMDD`
    YearMonthDay,
    /// `DDMMYYYY`
    DayMonthYear,
}

impl DateFormat {
    /// Parse a date, or `None` for anything that is not a real calendar date in this layout.
    pub fn parse(self, raw: &str) -> Option<NaiveDate> {
        let s = raw.trim();
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let (year, month, day) = match self {
            DateFormat::YearMonthDay => (&s[0..4], &s[4..6], &s[6..8]),
            DateFormat::DayMonthYear => (&s[4..8], &s[2..4], &s[0..2]),
        };
        NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
    }

    /// Format used for a given date column.
    pub fn for_field(field: Field) -> Option<Self> {
        match field {
            Field::CustomerOpenDate | Field::LastConsultedDate => Some(DateFormat::YearMonthDay),
            Field::DateOfBirth => Some(DateFormat::DayMonthYear),
            _ => None,
        }
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_alpha = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Routing key for a country value: trimmed and title-cased. Blank is `None`.
pub fn canonical_country(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(title_case(trimmed))
    }
}

/// How the country field is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountryRule {
    /// Drop rows without a country and canonicalize the rest.
    Require,
    /// Keep the value as read.
    PassThrough,
}

/// A detail row with typed, normalized fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    pub line: u64,
    pub record_type: String,
    pub customer_name: Option<String>,
    pub customer_id: Option<String>,
    pub customer_open_date: Option<NaiveDate>,
    pub last_consulted_date: Option<NaiveDate>,
    pub vaccination_type: Option<String>,
    pub doctor: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub post_code: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub active_customer: Option<String>,
}

impl NormalizedRow {
    pub fn has_missing_date(&self) -> bool {
        self.customer_open_date.is_none()
            || self.last_consulted_date.is_none()
            || self.date_of_birth.is_none()
    }

    fn from_detail(row: &DetailRow, country: Option<String>) -> Self {
        let text = |field: Field| row.get(field).map(str::to_string);
        let date = |field: Field| {
            let format = DateFormat::for_field(field)?;
            row.get(field).and_then(|raw| format.parse(raw))
        };

        Self {
            line: row.line,
            record_type: row.get(Field::RecordType).unwrap_or_default().to_string(),
            customer_name: text(Field::CustomerName),
            customer_id: text(Field::CustomerID),
            customer_open_date: date(Field::CustomerOpenDate),
            last_consulted_date: date(Field::LastConsultedDate),
            vaccination_type: text(Field::VaccinationType),
            doctor: text(Field::Doctor),
            state: text(Field::State),
            country,
            post_code: text(Field::PostCode),
            date_of_birth: date(Field::DateOfBirth),
            active_customer: text(Field::ActiveCustomer),
        }
    }
}

/// Normalizer output.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub rows: Vec<NormalizedRow>,
    pub dropped_blank_country: usize,
}

pub fn normalize(rows: Vec<DetailRow>, rule: CountryRule) -> Normalized {
    let mut out = Normalized::default();

    for row in &rows {
        let raw_country = row.get(Field::Country);
        let country = match rule {
            CountryRule::Require => match raw_country.and_then(canonical_country) {
                Some(c) => Some(c),
                None => {
                    debug!(line = row.line, "dropping row without country");
                    out.dropped_blank_country += 1;
                    continue;
                }
            },
            CountryRule::PassThrough => raw_country.map(str::to_string),
        };
        out.rows.push(NormalizedRow::from_detail(row, country));
    }

    info!(
        rows = out.rows.len(),
        dropped_blank_country = out.dropped_blank_country,
        "normalized detail rows"
    );
    out
}
