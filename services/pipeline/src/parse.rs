//! Parser/validator: binds `|`-delimited lines to the positional schema.

use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::report::Warning;
use crate::schema::{ColumnPolicy, ColumnShape, Field, EXPECTED_COLUMNS};
use crate::source::SourceText;

pub const DELIMITER: u8 = b'|';

/// How many malformed lines are logged one by one before summarizing.
const MALFORMED_LOG_LIMIT: usize = 5;

/// A raw line bound to the schema by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    /// 1-based physical line number (the header is line 1).
    pub line: u64,
    /// False when this line's field count differs from the header's.
    pub reliable: bool,
    values: Vec<String>,
    labels: &'static [Field],
}

impl ParsedRow {
    pub fn new(line: u64, values: Vec<String>, labels: &'static [Field], reliable: bool) -> Self {
        Self {
            line,
            reliable,
            values,
            labels,
        }
    }

    /// Value for a field. Empty text and unlabeled or absent positions read as missing.
    pub fn get(&self, field: Field) -> Option<&str> {
        if !self.labels.contains(&field) {
            return None;
        }
        self.values
            .get(field.index())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Untouched field values as read.
    pub fn raw(&self) -> &[String] {
        &self.values
    }
}

/// Parser output: the column shape decision plus every data line.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub shape: ColumnShape,
    pub rows: Vec<ParsedRow>,
    pub warnings: Vec<Warning>,
}

/// Parse the extract. The header line only establishes the column count; its names are
/// not used for binding.
pub fn parse(source: &SourceText, policy: ColumnPolicy) -> Result<ParsedTable> {
    let mut warnings = Vec::new();
    if source.had_decode_errors {
        warnings.push(Warning::InvalidUtf8);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::None)
        .from_reader(source.content.as_bytes());

    let header_len = reader.headers().map_err(csv_error)?.len();
    if header_len == 0 {
        return Err(PipelineError::EmptyInput);
    }

    let shape = ColumnShape::classify(header_len);
    match (shape, policy) {
        (ColumnShape::ExactMatch, _) => {}
        (_, ColumnPolicy::Strict) => {
            return Err(PipelineError::ColumnCount {
                found: header_len,
                expected: EXPECTED_COLUMNS,
            });
        }
        (_, ColumnPolicy::Lenient) => {
            warn!("{}; columns might not match the expected format", shape);
            warnings.push(Warning::ColumnCount { shape });
        }
    }
    let labels = shape.labeled_fields();

    let mut rows = Vec::new();
    let mut malformed = 0usize;
    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let reliable = record.len() == header_len;
        if !reliable {
            malformed += 1;
            if malformed <= MALFORMED_LOG_LIMIT {
                warn!(
                    line,
                    found = record.len(),
                    expected = header_len,
                    "line has unexpected field count"
                );
            }
            warnings.push(Warning::MalformedLine {
                line,
                found: record.len(),
                expected: header_len,
            });
        }

        let values = record.iter().map(str::to_string).collect();
        rows.push(ParsedRow::new(line, values, labels, reliable));
    }

    if malformed > MALFORMED_LOG_LIMIT {
        warn!(
            "... and {} more lines with unexpected field count",
            malformed - MALFORMED_LOG_LIMIT
        );
    }
    info!(lines = rows.len(), %shape, "parsed source");

    Ok(ParsedTable {
        shape,
        rows,
        warnings,
    })
}

fn csv_error(source: csv::Error) -> PipelineError {
    let line = source.position().map(|p| p.line()).unwrap_or(0);
    PipelineError::Csv { line, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Record_Type|Customer_Name|CustomerID|CustomerOpenDate|LastConsultedDate|VaccinationType|Doctor|State|Country|PostCode|DateofBirth|ActiveCustomer";

    fn parse_str(content: &str, policy: ColumnPolicy) -> Result<ParsedTable> {
        parse(&SourceText::from(content), policy)
    }

    #[test]
    fn test_binds_fields_by_position() {
        let csv = format!(
            "{}\nD|Alex|123457|20101012|20121013|MVD|Paul|SA|USA|06|03031987|A\n",
            HEADER
        );
        let table = parse_str(&csv, ColumnPolicy::Strict).unwrap();

        assert_eq!(table.shape, ColumnShape::ExactMatch);
        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.line, 2);
        assert!(row.reliable);
        assert_eq!(row.get(Field::RecordType), Some("D"));
        assert_eq!(row.get(Field::CustomerName), Some("Alex"));
        assert_eq!(row.get(Field::Country), Some("USA"));
        assert_eq!(row.get(Field::DateOfBirth), Some("03031987"));
        assert_eq!(row.get(Field::ActiveCustomer), Some("A"));
        assert!(table.warnings.is_empty());
    }

    #[test]
    fn test_header_names_are_not_used_for_binding() {
        let csv = "a|b|c|d|e|f|g|h|i|j|k|l\nD|n|1|x|x|x|x|x|India|x|x|A\n";
        let table = parse_str(csv, ColumnPolicy::Strict).unwrap();
        assert_eq!(table.rows[0].get(Field::Country), Some("India"));
    }

    #[test]
    fn test_values_are_not_trimmed() {
        let csv = format!("{}\nD|n|1|x|x|x|x|x|  india |x|x|A\n", HEADER);
        let table = parse_str(&csv, ColumnPolicy::Strict).unwrap();
        assert_eq!(table.rows[0].get(Field::Country), Some("  india "));
    }

    #[test]
    fn test_empty_field_reads_as_missing() {
        let csv = format!("{}\nD|n|1|x|x|x|x|x||x|x|A\n", HEADER);
        let table = parse_str(&csv, ColumnPolicy::Strict).unwrap();
        assert_eq!(table.rows[0].get(Field::Country), None);
        assert_eq!(table.rows[0].raw()[8], "");
    }

    #[test]
    fn test_strict_rejects_fewer_columns() {
        let csv = "a|b|c\nD|x|y\n";
        let err = parse_str(csv, ColumnPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ColumnCount {
                found: 3,
                expected: 12
            }
        ));
    }

    #[test]
    fn test_strict_rejects_more_columns() {
        let csv = format!("{}|Extra\nD|n|1|x|x|x|x|x|India|x|x|A|1\n", HEADER);
        assert!(parse_str(&csv, ColumnPolicy::Strict).is_err());
    }

    #[test]
    fn test_lenient_fewer_columns_warns_and_labels_prefix() {
        let csv = "a|b|c\nD|Alex|42\n";
        let table = parse_str(csv, ColumnPolicy::Lenient).unwrap();

        assert_eq!(table.shape, ColumnShape::FewerThanExpected(3));
        assert_eq!(
            table.warnings,
            vec![Warning::ColumnCount {
                shape: ColumnShape::FewerThanExpected(3)
            }]
        );
        let row = &table.rows[0];
        assert_eq!(row.get(Field::RecordType), Some("D"));
        assert_eq!(row.get(Field::CustomerID), Some("42"));
        assert_eq!(row.get(Field::Country), None);
    }

    #[test]
    fn test_lenient_more_columns_ignores_extra() {
        let csv = format!("{}|Extra\nD|n|1|x|x|x|x|x|India|x|x|A|surplus\n", HEADER);
        let table = parse_str(&csv, ColumnPolicy::Lenient).unwrap();
        assert_eq!(table.shape, ColumnShape::MoreThanExpected(13));
        assert_eq!(table.rows[0].get(Field::ActiveCustomer), Some("A"));
        assert_eq!(table.rows[0].raw().len(), 13);
    }

    #[test]
    fn test_malformed_line_is_kept_and_flagged() {
        let csv = format!(
            "{}\nD|n|1|x|x|x|x|x|India|x|x|A\nD|short|line\nD|n|2|x|x|x|x|x|Chile|x|x|A\n",
            HEADER
        );
        let table = parse_str(&csv, ColumnPolicy::Strict).unwrap();

        assert_eq!(table.rows.len(), 3);
        assert!(table.rows[0].reliable);
        assert!(!table.rows[1].reliable);
        assert!(table.rows[2].reliable);
        assert_eq!(
            table.warnings,
            vec![Warning::MalformedLine {
                line: 3,
                found: 3,
                expected: 12
            }]
        );
        assert_eq!(table.rows[1].get(Field::Country), None);
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let err = parse_str("", ColumnPolicy::Lenient).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
    }

    #[test]
    fn test_header_only_yields_no_rows() {
        let table = parse_str(&format!("{}\n", HEADER), ColumnPolicy::Strict).unwrap();
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_invalid_utf8_surfaces_as_warning() {
        let mut bytes = format!("{}\n", HEADER).into_bytes();
        bytes.extend_from_slice(b"D|n\xFF|1|x|x|x|x|x|India|x|x|A\n");
        let table = parse(&SourceText::from_bytes(&bytes), ColumnPolicy::Strict).unwrap();
        assert_eq!(table.warnings, vec![Warning::InvalidUtf8]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_parse_determinism() {
        let csv = format!(
            "{}\nD|a|1|x|x|x|x|x|India|x|x|A\nH|b|2|x|x|x|x|x|Chile|x|x|A\n",
            HEADER
        );
        let first = parse_str(&csv, ColumnPolicy::Strict).unwrap();
        for _ in 0..10 {
            let again = parse_str(&csv, ColumnPolicy::Strict).unwrap();
            assert_eq!(first.rows, again.rows);
        }
    }

    #[test]
    fn test_stray_quote_stays_on_its_line() {
        let csv = format!(
            "{}\nD|\"Doc Alex|1|x|x|x|x|x|Chile|x|x|A\nD|b|2|x|x|x|x|x|Chile|x|x|A\nD|c|3|x|x|x|x|x|Chile|x|x|A\n",
            HEADER
        );
        let table = parse_str(&csv, ColumnPolicy::Strict).unwrap();

        assert_eq!(table.rows.len(), 3);
        assert!(table.warnings.is_empty());
        assert!(table.rows.iter().all(|r| r.reliable));
        assert_eq!(table.rows[0].get(Field::CustomerName), Some("\"Doc Alex"));
        let lines: Vec<u64> = table.rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
    }
}
