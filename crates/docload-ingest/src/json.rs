//! JSON and JSON-lines parsing.
//!
//! Headers are the ordered union of keys across all sampled records, not
//! just the first one, since documents may differ in shape. Records are
//! aligned to that union; a document missing a key contributes `null`.

use serde_json::{Map, Value};
use tracing::debug;

use docload_model::{ErrorCode, ParseResult, ParsedRecord, RowError};

use crate::ParseOptions;

pub fn parse_json(content: &str, options: &ParseOptions) -> ParseResult {
    let mut result = ParseResult::default();
    let trimmed = content.trim_start_matches('\u{feff}');

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(error) => {
            result
                .errors
                .push(RowError::new(0, ErrorCode::ParseError, error.to_string()));
            return result;
        }
    };

    let elements = match value {
        Value::Array(elements) => elements,
        Value::Object(map) => {
            result
                .warnings
                .push("top-level object wrapped into a single-element array".to_string());
            vec![Value::Object(map)]
        }
        other => {
            result.errors.push(RowError::new(
                0,
                ErrorCode::ParseError,
                format!("expected a JSON array or object at top level, got {}", kind(&other)),
            ));
            return result;
        }
    };

    result.total_rows = elements.len();
    let sampled = sample_objects(elements.into_iter(), options, &mut result.errors);
    assemble(sampled, &mut result);
    debug!(rows = result.total_rows, sampled = result.records.len(), "parsed json content");
    result
}

pub fn parse_json_lines(content: &str, options: &ParseOptions) -> ParseResult {
    let mut result = ParseResult::default();
    let lines = content
        .lines()
        .map(|line| line.trim_matches('\u{feff}'))
        .filter(|line| !line.trim().is_empty());

    let mut values = Vec::new();
    for line in lines {
        result.total_rows += 1;
        match serde_json::from_str::<Value>(line) {
            Ok(value) => values.push(value),
            Err(error) => result.errors.push(RowError::new(
                result.total_rows,
                ErrorCode::ParseError,
                error.to_string(),
            )),
        }
    }

    let sampled = sample_objects(values.into_iter(), options, &mut result.errors);
    assemble(sampled, &mut result);
    debug!(rows = result.total_rows, sampled = result.records.len(), "parsed json-lines content");
    result
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Keep up to `max_rows` objects, recording non-object elements as
/// row-scoped errors.
fn sample_objects(
    values: impl Iterator<Item = Value>,
    options: &ParseOptions,
    errors: &mut Vec<RowError>,
) -> Vec<(usize, Map<String, Value>)> {
    let mut sampled = Vec::new();
    for (index, value) in values.enumerate() {
        let row_number = index + 1;
        match value {
            Value::Object(map) => {
                if options.max_rows.is_none_or(|cap| sampled.len() < cap) {
                    sampled.push((row_number, map));
                }
            }
            other => errors.push(RowError::new(
                row_number,
                ErrorCode::ParseError,
                format!("expected an object, got {}", kind(&other)),
            )),
        }
    }
    sampled
}

/// Single streaming reduction: build the ordered key union while walking the
/// sample once, then align every record to it.
fn assemble(sampled: Vec<(usize, Map<String, Value>)>, result: &mut ParseResult) {
    let mut headers: Vec<String> = Vec::new();
    for (_, map) in &sampled {
        for key in map.keys() {
            if !headers.iter().any(|existing| existing == key) {
                headers.push(key.clone());
            }
        }
    }

    for (row_number, mut map) in sampled {
        let values = headers
            .iter()
            .map(|key| map.remove(key).unwrap_or(Value::Null))
            .collect();
        result.records.push(ParsedRecord::new(row_number, values));
    }
    result.headers = headers;
}
