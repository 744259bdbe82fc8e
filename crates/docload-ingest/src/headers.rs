//! Header normalization shared by the delimited and spreadsheet paths.

use serde_json::Value;

/// Disambiguate blank and duplicate header names in order of appearance.
///
/// Blank headers become `column_<position>` (1-based); repeats get a numeric
/// suffix (`name`, `name_2`, ...). Every rename emits one warning.
pub(crate) fn dedupe_headers(raw: Vec<String>, warnings: &mut Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(raw.len());
    for (position, header) in raw.into_iter().enumerate() {
        let cleaned = header.trim().trim_matches('\u{feff}').to_string();
        let base = if cleaned.is_empty() {
            let name = format!("column_{}", position + 1);
            warnings.push(format!(
                "blank header at position {} renamed to '{name}'",
                position + 1
            ));
            name
        } else {
            cleaned
        };
        if seen.iter().any(|existing| existing == &base) {
            let mut suffix = 2usize;
            let mut candidate = format!("{base}_{suffix}");
            while seen.iter().any(|existing| existing == &candidate) {
                suffix += 1;
                candidate = format!("{base}_{suffix}");
            }
            warnings.push(format!(
                "duplicate header '{base}' renamed to '{candidate}'"
            ));
            seen.push(candidate);
        } else {
            seen.push(base);
        }
    }
    seen
}

/// Pad or truncate one row to the header width. Never a row-abort: short
/// rows are padded with `''`, long rows lose their extras, each with one
/// warning.
pub(crate) fn fit_row(
    values: &mut Vec<Value>,
    width: usize,
    row_number: usize,
    warnings: &mut Vec<String>,
) {
    if values.len() < width {
        warnings.push(format!(
            "row {row_number}: {} of {width} values, padded with empty strings",
            values.len()
        ));
        while values.len() < width {
            values.push(Value::String(String::new()));
        }
    } else if values.len() > width {
        warnings.push(format!(
            "row {row_number}: {} values exceed {width} headers, extras dropped",
            values.len()
        ));
        values.truncate(width);
    }
}
