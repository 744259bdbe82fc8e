//! Format-agnostic ingestion: one call turns raw content into a uniform
//! `(headers, records)` [`ParseResult`] regardless of source format.
//!
//! Parsing is always best-effort. Malformed rows become row-scoped errors in
//! the result; a zero-row result with populated errors is a valid return.
//! Content is supplied by the caller on every call — this crate owns no
//! upload, storage or retention.

mod delimited;
mod detect;
mod headers;
mod json;
mod spreadsheet;

pub use delimited::parse_delimited;
pub use detect::detect_format;
pub use json::{parse_json, parse_json_lines};
pub use spreadsheet::parse_spreadsheet;

use docload_model::{FileFormat, ParseResult};

/// Caller-tunable parse knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Truncate the returned records at this count; `total_rows` still
    /// reports the pre-truncation row count.
    pub max_rows: Option<usize>,
}

impl ParseOptions {
    pub fn sampled(max_rows: usize) -> Self {
        Self {
            max_rows: Some(max_rows),
        }
    }
}

/// Parse raw bytes in the given (or detected) format.
pub fn parse_content(
    content: &[u8],
    format: Option<FileFormat>,
    mime_type: Option<&str>,
    options: &ParseOptions,
) -> ParseResult {
    let format = format.unwrap_or_else(|| detect_format(content, mime_type));
    match format {
        FileFormat::Delimited { delimiter } => {
            parse_delimited(&String::from_utf8_lossy(content), delimiter, options)
        }
        FileFormat::Json => parse_json(&String::from_utf8_lossy(content), options),
        FileFormat::JsonLines => parse_json_lines(&String::from_utf8_lossy(content), options),
        FileFormat::Spreadsheet => parse_spreadsheet(content, options),
    }
}
