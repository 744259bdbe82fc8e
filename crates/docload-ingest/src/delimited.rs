//! Delimited-text parsing on top of the `csv` reader.
//!
//! Quoting follows RFC 4180: `"` toggles the quoted state, a doubled `""`
//! inside quotes escapes to one literal quote, and the delimiter only splits
//! fields while unquoted. Records are read flexibly; width mismatches are
//! repaired against the header row rather than aborting the row.

use csv::ReaderBuilder;
use serde_json::Value;
use tracing::debug;

use docload_model::{ErrorCode, ParseResult, ParsedRecord, RowError};

use crate::headers::{dedupe_headers, fit_row};
use crate::ParseOptions;

pub fn parse_delimited(content: &str, delimiter: u8, options: &ParseOptions) -> ParseResult {
    let mut result = ParseResult::default();
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let raw_headers = loop {
        match records.next() {
            Some(Ok(record)) => {
                break record.iter().map(str::to_string).collect::<Vec<_>>();
            }
            Some(Err(error)) => {
                result
                    .errors
                    .push(RowError::new(0, ErrorCode::ParseError, error.to_string()));
            }
            None => return result,
        }
    };
    result.headers = dedupe_headers(raw_headers, &mut result.warnings);

    let width = result.headers.len();
    let mut row_number = 0usize;
    for record in records {
        row_number += 1;
        match record {
            Ok(record) => {
                result.total_rows += 1;
                if options.max_rows.is_some_and(|cap| result.records.len() >= cap) {
                    continue;
                }
                let mut values: Vec<Value> = record
                    .iter()
                    .map(|cell| Value::String(cell.to_string()))
                    .collect();
                fit_row(&mut values, width, row_number, &mut result.warnings);
                result.records.push(ParsedRecord::new(row_number, values));
            }
            Err(error) => {
                result.total_rows += 1;
                result.errors.push(RowError::new(
                    row_number,
                    ErrorCode::ParseError,
                    error.to_string(),
                ));
            }
        }
    }

    debug!(
        rows = result.total_rows,
        sampled = result.records.len(),
        headers = width,
        "parsed delimited content"
    );
    result
}
