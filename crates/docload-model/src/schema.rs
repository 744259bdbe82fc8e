use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Classified value type for a sampled column.
///
/// Ordered roughly by specificity; the inference cascade checks structural
/// patterns before falling back to generic number/string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Null,
    Boolean,
    ObjectId,
    Email,
    Url,
    Phone,
    DateTime,
    Date,
    Time,
    Currency,
    Percentage,
    Integer,
    Decimal,
    Array,
    Object,
    String,
}

impl FieldType {
    /// Integer and decimal are pooled when computing the dominant type so a
    /// mixed numeric column is not misclassified as string.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Decimal | Self::Currency | Self::Percentage)
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::DateTime | Self::Time)
    }

    /// Types whose raw representation is free text.
    pub fn is_string_family(self) -> bool {
        matches!(
            self,
            Self::String | Self::Email | Self::Url | Self::Phone | Self::ObjectId
        )
    }
}

/// Numeric spread observed in the sample.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// String length spread observed in the sample.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StringStats {
    pub min_length: usize,
    pub max_length: usize,
    pub mean_length: f64,
}

/// Validation hints derived from the sample, consumed by form generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestedValidation {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub max_length: Option<usize>,
    /// Enumerated options, suggested for low-cardinality columns.
    pub options: Option<Vec<String>>,
}

/// Per-column inference result.
///
/// Invariants: `type_breakdown` values sum to `total_values`;
/// `confidence = dominant_count / non_null_count` (0 when the column is
/// entirely null).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferredField {
    pub name: String,
    pub field_type: FieldType,
    pub confidence: f64,
    pub type_breakdown: BTreeMap<FieldType, usize>,
    pub total_values: usize,
    pub non_null_count: usize,
    pub unique_count: usize,
    /// Every non-null sampled value was distinct.
    pub is_unique: bool,
    /// Zero null observations in-sample. Descriptive only; not a guarantee
    /// over the full file.
    pub is_required: bool,
    pub numeric_stats: Option<NumericStats>,
    pub string_stats: Option<StringStats>,
    pub validation: SuggestedValidation,
}

impl InferredField {
    pub fn dominant_count(&self) -> usize {
        self.type_breakdown
            .iter()
            .filter(|(t, _)| **t != FieldType::Null)
            .map(|(_, count)| *count)
            .max()
            .unwrap_or(0)
    }
}

/// Whole-sample inference output. Computed once per job from a bounded
/// sample; may be recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferredSchema {
    pub fields: Vec<InferredField>,
    pub warnings: Vec<String>,
    pub suggested_collection: String,
    /// Number of rows the inference actually saw.
    pub sample_size: usize,
}

impl InferredSchema {
    pub fn field(&self, name: &str) -> Option<&InferredField> {
        self.fields.iter().find(|f| f.name == name)
    }
}
