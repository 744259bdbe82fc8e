use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::FieldType;

/// Widget kind consumed by the downstream form renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldType {
    ShortText,
    LongText,
    Number,
    YesNo,
    DatePicker,
    DateTimePicker,
    TimePicker,
    MultiSelect,
}

impl FormFieldType {
    /// Default widget for an inferred column type.
    pub fn for_field_type(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Integer
            | FieldType::Decimal
            | FieldType::Currency
            | FieldType::Percentage => Self::Number,
            FieldType::Boolean => Self::YesNo,
            FieldType::Date => Self::DatePicker,
            FieldType::DateTime => Self::DateTimePicker,
            FieldType::Time => Self::TimePicker,
            FieldType::Array => Self::MultiSelect,
            FieldType::Object => Self::LongText,
            FieldType::Null
            | FieldType::String
            | FieldType::ObjectId
            | FieldType::Email
            | FieldType::Url
            | FieldType::Phone => Self::ShortText,
        }
    }
}

/// Validation attached to a generated form field, sourced from the schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormValidation {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub max_length: Option<usize>,
    pub options: Option<Vec<String>>,
}

/// One derived data-entry form field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub field_type: FormFieldType,
    pub required: bool,
    pub validation: Option<FormValidation>,
}

/// Filters applied while deriving a form configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormConfigOptions {
    /// When non-empty, only these columns are considered.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Per-column widget overrides.
    pub overrides: BTreeMap<String, FormFieldType>,
    /// Attach min/max/options validation sourced from the inferred schema.
    pub include_validation: bool,
}
