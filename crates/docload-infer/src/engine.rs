//! Per-column schema inference over a bounded sample.
//!
//! Pure: never touches the target store, never mutates its input. All
//! thresholds (mixed-type at 10%, option suggestion at 20 uniques / 30% of
//! sample) operate on the sample only, so `is_required`/`is_unique` are
//! descriptive rather than guarantees over the full file.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

use docload_model::{
    FieldType, InferredField, InferredSchema, NumericStats, ParseResult, StringStats,
    SuggestedValidation,
};

use crate::patterns::classify;

/// Fraction of non-null samples a secondary type must exceed to count
/// toward a `mixed_types` warning.
const MIXED_TYPE_THRESHOLD: f64 = 0.10;
/// Option suggestion: unique count must be in (0, 20] and under 30% of the
/// sample size.
const MAX_SUGGESTED_OPTIONS: usize = 20;
const OPTION_CARDINALITY_RATIO: f64 = 0.30;

/// Infer a schema from a parse result.
///
/// `source_name` seeds the suggested target-collection name.
pub fn infer_schema(parsed: &ParseResult, source_name: &str) -> InferredSchema {
    let sample_size = parsed.records.len();
    let mut warnings = Vec::new();
    let fields = parsed
        .headers
        .iter()
        .enumerate()
        .map(|(index, name)| infer_column(name, index, parsed, &mut warnings))
        .collect();

    debug!(columns = parsed.headers.len(), sample = sample_size, "inferred schema");
    InferredSchema {
        fields,
        warnings,
        suggested_collection: suggest_collection_name(source_name),
        sample_size,
    }
}

fn infer_column(
    name: &str,
    index: usize,
    parsed: &ParseResult,
    warnings: &mut Vec<String>,
) -> InferredField {
    let mut breakdown: BTreeMap<FieldType, usize> = BTreeMap::new();
    let mut uniques: BTreeSet<String> = BTreeSet::new();
    let mut numbers: Vec<f64> = Vec::new();
    let mut lengths: Vec<usize> = Vec::new();
    let mut total_values = 0usize;

    for record in &parsed.records {
        let value = record.values.get(index).unwrap_or(&Value::Null);
        total_values += 1;
        let field_type = classify(value);
        *breakdown.entry(field_type).or_insert(0) += 1;
        if field_type == FieldType::Null {
            continue;
        }
        let text = value_text(value);
        uniques.insert(text.clone());
        if field_type.is_numeric()
            && let Some(number) = parse_numeric(&text)
        {
            numbers.push(number);
        }
        if field_type.is_string_family() {
            lengths.push(text.chars().count());
        }
    }

    let null_count = breakdown.get(&FieldType::Null).copied().unwrap_or(0);
    let non_null_count = total_values - null_count;
    let (field_type, dominant_count) = dominant_type(&breakdown);
    let confidence = if non_null_count == 0 {
        0.0
    } else {
        dominant_count as f64 / non_null_count as f64
    };

    if non_null_count == 0 && total_values > 0 {
        warnings.push(format!("empty_column: '{name}' has no values in the sample"));
    }
    if has_mixed_types(&breakdown, non_null_count) {
        warnings.push(format!(
            "mixed_types: '{name}' holds more than one significant value type"
        ));
    }

    let numeric_stats = numeric_stats(&numbers);
    let string_stats = string_stats(&lengths);
    let unique_count = uniques.len();
    let suggested_options = suggest_options(&uniques, non_null_count, total_values);

    let validation = SuggestedValidation {
        min: numeric_stats.map(|s| s.min),
        max: numeric_stats.map(|s| s.max),
        max_length: string_stats.map(|s| s.max_length),
        options: suggested_options,
    };

    InferredField {
        name: name.to_string(),
        field_type,
        confidence,
        type_breakdown: breakdown,
        total_values,
        non_null_count,
        unique_count,
        is_unique: non_null_count > 0 && unique_count == non_null_count,
        is_required: total_values > 0 && null_count == 0,
        numeric_stats,
        string_stats,
        validation,
    }
}

/// Pick the dominant non-null type. Integer and decimal observations are
/// pooled first so a mixed numeric column resolves to decimal instead of
/// falling through to string.
fn dominant_type(breakdown: &BTreeMap<FieldType, usize>) -> (FieldType, usize) {
    let integer = breakdown.get(&FieldType::Integer).copied().unwrap_or(0);
    let decimal = breakdown.get(&FieldType::Decimal).copied().unwrap_or(0);
    let pooled = integer + decimal;

    let mut best = (FieldType::String, 0usize);
    for (&field_type, &count) in breakdown {
        if field_type == FieldType::Null {
            continue;
        }
        let effective = match field_type {
            FieldType::Integer | FieldType::Decimal => pooled,
            _ => count,
        };
        if effective > best.1 {
            best = (field_type, effective);
        }
    }
    if best.1 == 0 {
        return (FieldType::String, 0);
    }
    // A pooled numeric win resolves to decimal when any decimals were seen.
    if matches!(best.0, FieldType::Integer | FieldType::Decimal) {
        let resolved = if decimal > 0 {
            FieldType::Decimal
        } else {
            FieldType::Integer
        };
        return (resolved, pooled);
    }
    best
}

fn has_mixed_types(breakdown: &BTreeMap<FieldType, usize>, non_null_count: usize) -> bool {
    if non_null_count == 0 {
        return false;
    }
    let threshold = non_null_count as f64 * MIXED_TYPE_THRESHOLD;
    let mut significant = 0usize;
    let mut numeric_seen = false;
    for (&field_type, &count) in breakdown {
        if field_type == FieldType::Null || count as f64 <= threshold {
            continue;
        }
        // Pooled numerics count once.
        if matches!(field_type, FieldType::Integer | FieldType::Decimal) {
            if numeric_seen {
                continue;
            }
            numeric_seen = true;
        }
        significant += 1;
    }
    significant > 1
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn parse_numeric(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',' | '%' | ' '))
        .collect();
    cleaned.parse::<f64>().ok()
}

fn numeric_stats(numbers: &[f64]) -> Option<NumericStats> {
    if numbers.is_empty() {
        return None;
    }
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
    Some(NumericStats { min, max, mean })
}

fn string_stats(lengths: &[usize]) -> Option<StringStats> {
    if lengths.is_empty() {
        return None;
    }
    Some(StringStats {
        min_length: lengths.iter().copied().min().unwrap_or(0),
        max_length: lengths.iter().copied().max().unwrap_or(0),
        mean_length: lengths.iter().sum::<usize>() as f64 / lengths.len() as f64,
    })
}

fn suggest_options(
    uniques: &BTreeSet<String>,
    non_null_count: usize,
    sample_size: usize,
) -> Option<Vec<String>> {
    let unique_count = uniques.len();
    if non_null_count == 0 || unique_count == 0 || unique_count > MAX_SUGGESTED_OPTIONS {
        return None;
    }
    if (unique_count as f64) >= sample_size as f64 * OPTION_CARDINALITY_RATIO {
        return None;
    }
    Some(uniques.iter().cloned().collect())
}

/// Collection names come from the source file: stem, lowercased, squashed
/// to `[a-z0-9_]`.
fn suggest_collection_name(source_name: &str) -> String {
    let stem = source_name
        .rsplit('/')
        .next()
        .unwrap_or(source_name)
        .split('.')
        .next()
        .unwrap_or(source_name);
    let mut name: String = stem
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    while name.contains("__") {
        name = name.replace("__", "_");
    }
    let name = name.trim_matches('_').to_string();
    if name.is_empty() {
        "imported_data".to_string()
    } else {
        name
    }
}
