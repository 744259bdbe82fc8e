//! Format detection: MIME hint first, then content sniffing.

use docload_model::FileFormat;

/// Detect the source format of raw content.
///
/// Pure: the same input always yields the same answer. The MIME hint wins
/// when recognized; otherwise binary magic identifies spreadsheets, a
/// leading `[`/`{` identifies JSON (JSON-lines when every non-empty line
/// parses independently), and anything else falls back to a delimiter vote
/// over the first line.
pub fn detect_format(content: &[u8], mime_type: Option<&str>) -> FileFormat {
    if let Some(mime) = mime_type
        && let Some(format) = format_from_mime(mime)
    {
        return format;
    }

    if looks_like_spreadsheet(content) {
        return FileFormat::Spreadsheet;
    }

    let text = String::from_utf8_lossy(content);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return if is_json_lines(trimmed) {
            FileFormat::JsonLines
        } else {
            FileFormat::Json
        };
    }

    FileFormat::Delimited {
        delimiter: vote_delimiter(&text),
    }
}

fn format_from_mime(mime: &str) -> Option<FileFormat> {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence {
        "text/csv" | "application/csv" => Some(FileFormat::csv()),
        "text/tab-separated-values" => Some(FileFormat::Delimited { delimiter: b'\t' }),
        "application/json" => Some(FileFormat::Json),
        "application/x-ndjson" | "application/jsonl" | "application/x-jsonlines" => {
            Some(FileFormat::JsonLines)
        }
        "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
            Some(FileFormat::Spreadsheet)
        }
        _ => None,
    }
}

/// ZIP container (xlsx) or OLE compound file (legacy xls).
fn looks_like_spreadsheet(content: &[u8]) -> bool {
    content.starts_with(b"PK\x03\x04") || content.starts_with(&[0xd0, 0xcf, 0x11, 0xe0])
}

/// JSON-lines when there is more than one non-empty line and each parses as
/// a standalone JSON value. A single-line document stays plain JSON.
fn is_json_lines(text: &str) -> bool {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let Some(first) = lines.next() else {
        return false;
    };
    let mut count = 1usize;
    if serde_json::from_str::<serde_json::Value>(first).is_err() {
        return false;
    }
    for line in lines {
        count += 1;
        if serde_json::from_str::<serde_json::Value>(line).is_err() {
            return false;
        }
    }
    count > 1
}

/// Vote a delimiter by frequency in the first line.
///
/// Precedence on equal counts is tab > comma > semicolon > pipe, except that
/// any tie involving the comma resolves to comma. Zero votes default to
/// comma.
fn vote_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");
    let candidates: [(u8, usize); 4] = [
        (b'\t', first_line.matches('\t').count()),
        (b',', first_line.matches(',').count()),
        (b';', first_line.matches(';').count()),
        (b'|', first_line.matches('|').count()),
    ];
    let best = candidates.iter().map(|(_, n)| *n).max().unwrap_or(0);
    if best == 0 {
        return b',';
    }
    let comma_count = candidates[1].1;
    if comma_count == best {
        return b',';
    }
    candidates
        .iter()
        .find(|(_, n)| *n == best)
        .map(|(d, _)| *d)
        .unwrap_or(b',')
}
