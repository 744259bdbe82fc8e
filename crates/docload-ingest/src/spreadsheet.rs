//! Spreadsheet-binary parsing via `calamine`.
//!
//! Only the first worksheet is read. Cells keep their native type where the
//! document model has one (numbers, booleans); everything else is
//! stringified. Header handling and width repair share the delimited path.

use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use serde_json::Value;
use tracing::debug;

use docload_model::{ErrorCode, ParseResult, ParsedRecord, RowError};

use crate::ParseOptions;

pub fn parse_spreadsheet(content: &[u8], options: &ParseOptions) -> ParseResult {
    let mut result = ParseResult::default();

    let mut workbook = match open_workbook_auto_from_rs(Cursor::new(content)) {
        Ok(workbook) => workbook,
        Err(error) => {
            result.errors.push(RowError::new(
                0,
                ErrorCode::ParseError,
                format!("unreadable workbook: {error}"),
            ));
            return result;
        }
    };

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(error)) => {
            result.errors.push(RowError::new(
                0,
                ErrorCode::ParseError,
                format!("unreadable worksheet: {error}"),
            ));
            return result;
        }
        None => {
            result
                .errors
                .push(RowError::new(0, ErrorCode::ParseError, "workbook has no worksheets"));
            return result;
        }
    };

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return result;
    };
    let raw_headers: Vec<String> = header_row.iter().map(cell_to_header).collect();
    result.headers = crate::headers::dedupe_headers(raw_headers, &mut result.warnings);

    let width = result.headers.len();
    let mut row_number = 0usize;
    for row in rows {
        row_number += 1;
        result.total_rows += 1;
        if options.max_rows.is_some_and(|cap| result.records.len() >= cap) {
            continue;
        }
        let mut values: Vec<Value> = row.iter().map(cell_to_value).collect();
        crate::headers::fit_row(&mut values, width, row_number, &mut result.warnings);
        result.records.push(ParsedRecord::new(row_number, values));
    }

    debug!(
        rows = result.total_rows,
        sampled = result.records.len(),
        "parsed spreadsheet content"
    );
    result
}

fn cell_to_header(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::String(String::new()),
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => Value::from(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::String(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => Value::String(format!("#ERR {e:?}")),
    }
}
