//! Single-value classification.
//!
//! The cascade runs from most to least specific: null, boolean literal,
//! structural patterns (object id, email, URL, phone, ISO date-time, ISO
//! date, locale date, time, currency, percentage), then generic
//! integer/decimal, then string.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;

use docload_model::FieldType;

static OBJECT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("object id regex"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex")
});
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://\S+$").expect("url regex"));
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?\d{0,2}[-\s.]?\(?\d{3}\)?[-\s.]?\d{3}[-\s.]?\d{4}$").expect("phone regex")
});
static ISO_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?$")
        .expect("iso datetime regex")
});
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("iso date regex"));
static LOCALE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4}$").expect("locale date regex")
});
static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?( ?[AaPp][Mm])?$").expect("time regex")
});
static CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[$€£¥]\s?-?\d{1,3}(,\d{3})*(\.\d+)?$|^-?\d{1,3}(,\d{3})*(\.\d+)?\s?[$€£¥]$")
        .expect("currency regex")
});
static PERCENTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?\s?%$").expect("percentage regex"));
static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+$").expect("integer regex"));
static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d*\.\d+$").expect("decimal regex"));

/// Classify one raw cell value.
pub fn classify(value: &Value) -> FieldType {
    match value {
        Value::Null => FieldType::Null,
        Value::Bool(_) => FieldType::Boolean,
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                FieldType::Integer
            } else {
                FieldType::Decimal
            }
        }
        Value::Array(_) => FieldType::Array,
        Value::Object(_) => FieldType::Object,
        Value::String(s) => classify_text(s),
    }
}

fn classify_text(raw: &str) -> FieldType {
    let text = raw.trim();
    if text.is_empty() {
        return FieldType::Null;
    }
    if is_boolean_literal(text) {
        return FieldType::Boolean;
    }
    if OBJECT_ID.is_match(text) {
        return FieldType::ObjectId;
    }
    if EMAIL.is_match(text) {
        return FieldType::Email;
    }
    if URL.is_match(text) {
        return FieldType::Url;
    }
    if ISO_DATETIME.is_match(text) {
        return FieldType::DateTime;
    }
    if ISO_DATE.is_match(text) && parses_as_iso_date(text) {
        return FieldType::Date;
    }
    if LOCALE_DATE.is_match(text) {
        return FieldType::Date;
    }
    if TIME.is_match(text) {
        return FieldType::Time;
    }
    if CURRENCY.is_match(text) {
        return FieldType::Currency;
    }
    if PERCENTAGE.is_match(text) {
        return FieldType::Percentage;
    }
    if INTEGER.is_match(text) {
        return FieldType::Integer;
    }
    if DECIMAL.is_match(text) || text.parse::<f64>().is_ok() {
        return FieldType::Decimal;
    }
    // Phone is checked after numerics so a plain integer column is not
    // mistaken for phone numbers.
    if PHONE.is_match(text) {
        return FieldType::Phone;
    }
    FieldType::String
}

fn is_boolean_literal(text: &str) -> bool {
    matches!(
        text.to_ascii_lowercase().as_str(),
        "true" | "false" | "yes" | "no"
    )
}

fn parses_as_iso_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}
