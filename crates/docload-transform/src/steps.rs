//! Single transform-step application.
//!
//! Each function consumes the previous step's output. A failing step
//! returns `Err` with a message; the pipeline records it and passes `null`
//! onward — steps themselves never see row bookkeeping.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Value, json};

use docload_model::TransformStep;

use crate::document::{is_empty_value, value_text};

/// Shared per-run state: compiled regexes are cached by pattern so a batch
/// loop does not recompile per row.
#[derive(Debug, Default)]
pub struct StepContext {
    regex_cache: HashMap<String, Regex>,
}

impl StepContext {
    pub fn regex(&mut self, pattern: &str) -> Result<&Regex, String> {
        if !self.regex_cache.contains_key(pattern) {
            let compiled =
                Regex::new(pattern).map_err(|e| format!("invalid pattern '{pattern}': {e}"))?;
            self.regex_cache.insert(pattern.to_string(), compiled);
        }
        Ok(&self.regex_cache[pattern])
    }
}

/// Raw-row lookup handed to template substitution.
pub trait RawLookup {
    fn raw_text(&self, column: &str) -> Option<String>;
}

pub fn apply_step(
    ctx: &mut StepContext,
    step: &TransformStep,
    value: Value,
    raw: &dyn RawLookup,
) -> Result<Value, String> {
    match step {
        TransformStep::Trim => Ok(match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        }),
        TransformStep::Uppercase => Ok(match value {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        }),
        TransformStep::Lowercase => Ok(match value {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        }),
        TransformStep::ParseNumber => parse_number(value),
        TransformStep::ParseDate => parse_date(value),
        TransformStep::ParseBoolean {
            true_values,
            false_values,
        } => parse_boolean(value, true_values, false_values),
        TransformStep::ParseJson => parse_json(value),
        TransformStep::SplitArray { separator } => split_array(value, separator),
        TransformStep::JoinArray { separator } => join_array(value, separator),
        TransformStep::RegexReplace {
            pattern,
            replacement,
        } => {
            let regex = ctx.regex(pattern)?;
            Ok(match value {
                Value::String(s) => {
                    Value::String(regex.replace_all(&s, replacement.as_str()).into_owned())
                }
                other => other,
            })
        }
        TransformStep::Template { template } => Ok(Value::String(substitute(template, raw))),
        TransformStep::DefaultIfEmpty { value: default } => Ok(if is_empty_value(&value) {
            default.clone()
        } else {
            value
        }),
        TransformStep::NullIfEmpty => Ok(if is_empty_value(&value) {
            Value::Null
        } else {
            value
        }),
        TransformStep::ToObjectId => to_object_id(value),
    }
}

/// Substitute `{{column}}` tokens against the raw source row. Unknown
/// columns substitute to the empty string.
pub fn substitute(template: &str, raw: &dyn RawLookup) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let column = after[..end].trim();
                if let Some(text) = raw.raw_text(column) {
                    output.push_str(&text);
                }
                rest = &after[end + 2..];
            }
            None => {
                output.push_str(&rest[start..]);
                return output;
            }
        }
    }
    output.push_str(rest);
    output
}

fn parse_number(value: Value) -> Result<Value, String> {
    if is_empty_value(&value) || value.is_number() {
        return Ok(value);
    }
    let text = value_text(&value);
    let cleaned = text.trim().replace(',', "");
    if let Ok(int) = cleaned.parse::<i64>() {
        return Ok(json!(int));
    }
    if let Ok(float) = cleaned.parse::<f64>() {
        return Ok(json!(float));
    }
    Err(format!("cannot parse '{}' as a number", text.trim()))
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Normalize to ISO 8601: date-only inputs stay `YYYY-MM-DD`, timestamped
/// inputs become RFC 3339.
fn parse_date(value: Value) -> Result<Value, String> {
    if is_empty_value(&value) {
        return Ok(value);
    }
    let text = value_text(&value);
    let trimmed = text.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(json!(datetime.to_utc().to_rfc3339()));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(json!(naive.and_utc().to_rfc3339()));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(json!(date.format("%Y-%m-%d").to_string()));
        }
    }
    Err(format!("cannot parse '{trimmed}' as a date"))
}

fn parse_boolean(
    value: Value,
    true_values: &[String],
    false_values: &[String],
) -> Result<Value, String> {
    if is_empty_value(&value) || value.is_boolean() {
        return Ok(value);
    }
    let text = value_text(&value).trim().to_lowercase();
    if true_values.iter().any(|t| t.to_lowercase() == text) {
        return Ok(Value::Bool(true));
    }
    if false_values.iter().any(|t| t.to_lowercase() == text) {
        return Ok(Value::Bool(false));
    }
    Err(format!("'{text}' is neither a true nor a false token"))
}

fn parse_json(value: Value) -> Result<Value, String> {
    if is_empty_value(&value) {
        return Ok(value);
    }
    match value {
        Value::String(s) => serde_json::from_str(&s)
            .map_err(|e| format!("embedded JSON does not parse: {e}")),
        other => Ok(other),
    }
}

fn split_array(value: Value, separator: &str) -> Result<Value, String> {
    if is_empty_value(&value) {
        return Ok(value);
    }
    match value {
        Value::String(s) => {
            let items: Vec<Value> = s
                .split(separator)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect();
            Ok(Value::Array(items))
        }
        Value::Array(items) => Ok(Value::Array(items)),
        other => Err(format!("cannot split {} into an array", type_name(&other))),
    }
}

fn join_array(value: Value, separator: &str) -> Result<Value, String> {
    match value {
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(value_text)
                .collect::<Vec<_>>()
                .join(separator);
            Ok(Value::String(joined))
        }
        other => Ok(other),
    }
}

/// Validate a 24-hex-digit id and tag it in extended-JSON form so the
/// target store can recognize it as an object id.
fn to_object_id(value: Value) -> Result<Value, String> {
    if is_empty_value(&value) {
        return Ok(value);
    }
    let text = value_text(&value);
    let trimmed = text.trim();
    if trimmed.len() == 24 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(json!({ "$oid": trimmed.to_lowercase() }))
    } else {
        Err(format!("'{trimmed}' is not a 24-hex-digit object id"))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
