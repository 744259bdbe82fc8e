use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One named step in a per-column transform pipeline.
///
/// A closed union rather than an open string-keyed map: adding a step kind
/// forces every `match` in the transform engine to be revisited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformStep {
    /// Trim surrounding whitespace.
    Trim,
    Uppercase,
    Lowercase,
    /// Coerce to integer or decimal.
    ParseNumber,
    /// Parse into an ISO 8601 date-time string. Accepts ISO date/date-time
    /// plus a handful of locale formats.
    ParseDate,
    /// Coerce to boolean using configurable token sets.
    ParseBoolean {
        #[serde(default = "default_true_values")]
        true_values: Vec<String>,
        #[serde(default = "default_false_values")]
        false_values: Vec<String>,
    },
    /// Parse the value as embedded JSON.
    ParseJson,
    /// Split a string into an array on a separator.
    SplitArray {
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Join an array into a string with a separator.
    JoinArray {
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Regex find-and-replace over the string form of the value.
    RegexReplace { pattern: String, replacement: String },
    /// Substitute `{{column}}` tokens against the raw source row.
    Template { template: String },
    /// Replace an empty value with a constant.
    DefaultIfEmpty { value: Value },
    /// Replace an empty value with `null`.
    NullIfEmpty,
    /// Validate and tag a 24-hex-digit object id.
    ToObjectId,
}

fn default_true_values() -> Vec<String> {
    ["true", "yes", "1", "y", "t"].map(String::from).to_vec()
}

fn default_false_values() -> Vec<String> {
    ["false", "no", "0", "n", "f"].map(String::from).to_vec()
}

fn default_separator() -> String {
    ",".to_string()
}

impl TransformStep {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Trim => "Trim",
            Self::Uppercase => "Uppercase",
            Self::Lowercase => "Lowercase",
            Self::ParseNumber => "Parse Number",
            Self::ParseDate => "Parse Date",
            Self::ParseBoolean { .. } => "Parse Boolean",
            Self::ParseJson => "Parse JSON",
            Self::SplitArray { .. } => "Split Array",
            Self::JoinArray { .. } => "Join Array",
            Self::RegexReplace { .. } => "Regex Replace",
            Self::Template { .. } => "Template",
            Self::DefaultIfEmpty { .. } => "Default If Empty",
            Self::NullIfEmpty => "Null If Empty",
            Self::ToObjectId => "Object Id",
        }
    }

    pub fn parse_boolean() -> Self {
        Self::ParseBoolean {
            true_values: default_true_values(),
            false_values: default_false_values(),
        }
    }
}

/// What happens to one source column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ColumnAction {
    /// One-to-one import into `target_path`.
    Import,
    /// Exclude the column entirely.
    Skip,
    /// Concatenate this column and the named siblings into one target.
    Merge {
        sources: Vec<String>,
        #[serde(default = "default_merge_separator")]
        separator: String,
    },
    /// Extract multiple target paths from one value via regex capture
    /// groups; a target whose group did not match is silently skipped.
    Split {
        pattern: String,
        targets: Vec<String>,
    },
}

fn default_merge_separator() -> String {
    " ".to_string()
}

/// One column's approved fate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source_column: String,
    #[serde(flatten)]
    pub action: ColumnAction,
    /// Dot-notation path in the target document.
    pub target_path: String,
    #[serde(default)]
    pub transforms: Vec<TransformStep>,
    /// Empty-after-transform raises a `RequiredMissing` row error.
    #[serde(default)]
    pub required: bool,
    /// Withhold this column's contribution when empty, instead of writing
    /// `null`.
    #[serde(default)]
    pub skip_if_empty: bool,
}

impl ColumnMapping {
    pub fn import(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_column: source.into(),
            action: ColumnAction::Import,
            target_path: target.into(),
            transforms: Vec::new(),
            required: false,
            skip_if_empty: false,
        }
    }

    pub fn with_transforms(mut self, transforms: Vec<TransformStep>) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Template-substituted field evaluated against the **raw** source row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedField {
    pub target_path: String,
    pub template: String,
}

/// Constant merged into every document, last, deliberately able to override
/// colliding paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticField {
    pub target_path: String,
    pub value: Value,
}

/// The human-editable contract between inference and transform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    pub columns: Vec<ColumnMapping>,
    #[serde(default)]
    pub computed_fields: Vec<ComputedField>,
    #[serde(default)]
    pub static_fields: Vec<StaticField>,
    /// Composite duplicate-detection key over **transformed** output paths;
    /// first occurrence wins.
    #[serde(default)]
    pub duplicate_key: Option<Vec<String>>,
}

impl MappingConfig {
    pub fn mapping_for(&self, source_column: &str) -> Option<&ColumnMapping> {
        self.columns.iter().find(|m| m.source_column == source_column)
    }

    /// All document paths this config can produce.
    pub fn target_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        for mapping in &self.columns {
            match &mapping.action {
                ColumnAction::Skip => {}
                ColumnAction::Split { targets, .. } => {
                    paths.extend(targets.iter().map(String::as_str));
                }
                ColumnAction::Import | ColumnAction::Merge { .. } => {
                    paths.push(mapping.target_path.as_str());
                }
            }
        }
        paths.extend(self.computed_fields.iter().map(|f| f.target_path.as_str()));
        paths.extend(self.static_fields.iter().map(|f| f.target_path.as_str()));
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_step_round_trips() {
        let step = TransformStep::RegexReplace {
            pattern: r"\s+".to_string(),
            replacement: " ".to_string(),
        };
        let json = serde_json::to_string(&step).expect("serialize step");
        assert!(json.contains("regex_replace"));
        let round: TransformStep = serde_json::from_str(&json).expect("deserialize step");
        assert_eq!(round, step);
    }

    #[test]
    fn parse_boolean_defaults_apply() {
        let step: TransformStep =
            serde_json::from_str(r#"{"type":"parse_boolean"}"#).expect("deserialize");
        let TransformStep::ParseBoolean { true_values, .. } = step else {
            panic!("expected parse_boolean");
        };
        assert!(true_values.contains(&"yes".to_string()));
    }

    #[test]
    fn target_paths_cover_all_field_sources() {
        let config = MappingConfig {
            columns: vec![
                ColumnMapping::import("a", "a"),
                ColumnMapping {
                    source_column: "b".to_string(),
                    action: ColumnAction::Skip,
                    target_path: "b".to_string(),
                    transforms: vec![],
                    required: false,
                    skip_if_empty: false,
                },
            ],
            computed_fields: vec![ComputedField {
                target_path: "full".to_string(),
                template: "{{a}}".to_string(),
            }],
            static_fields: vec![StaticField {
                target_path: "source".to_string(),
                value: serde_json::json!("import"),
            }],
            duplicate_key: None,
        };
        let paths = config.target_paths();
        assert_eq!(paths, vec!["a", "full", "source"]);
    }
}
