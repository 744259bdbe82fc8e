use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::job::RowError;

/// One parsed source row, aligned to the headers of its [`ParseResult`].
///
/// `values` always has exactly as many entries as the result's `headers`;
/// short rows are padded and long rows truncated by the parser, each with a
/// warning. Records are ephemeral and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedRecord {
    /// 1-based, stable source row number (header row excluded).
    pub row_number: usize,
    /// Raw cell values, one per header, in header order.
    pub values: Vec<Value>,
}

impl ParsedRecord {
    pub fn new(row_number: usize, values: Vec<Value>) -> Self {
        Self { row_number, values }
    }

    /// Look up a raw value by column name within the given header list.
    pub fn get<'a>(&'a self, headers: &[String], column: &str) -> Option<&'a Value> {
        headers
            .iter()
            .position(|h| h == column)
            .and_then(|idx| self.values.get(idx))
    }
}

/// Uniform parser output across all supported formats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    /// Ordered, deduplicated column names.
    pub headers: Vec<String>,
    /// Parsed rows; may be truncated by a `max_rows` cap.
    pub records: Vec<ParsedRecord>,
    /// Pre-truncation data row count ("sampled N of M" reporting).
    pub total_rows: usize,
    /// Row-scoped parse failures. A zero-row result with populated errors is
    /// a valid return; parsing never raises on bad data.
    pub errors: Vec<RowError>,
    pub warnings: Vec<String>,
}

impl ParseResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
