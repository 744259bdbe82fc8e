//! Default mapping suggestion from an inferred schema.
//!
//! Every suggested pipeline ends with null-if-empty so untouched blanks
//! land as `null` rather than empty strings.

use docload_model::{ColumnMapping, FieldType, InferredField, InferredSchema, TransformStep};

/// Propose one default [`ColumnMapping`] per inferred field.
pub fn suggest_mappings(schema: &InferredSchema) -> Vec<ColumnMapping> {
    schema.fields.iter().map(suggest_mapping).collect()
}

fn suggest_mapping(field: &InferredField) -> ColumnMapping {
    let mut transforms = match field.field_type {
        t if t.is_temporal() && t != FieldType::Time => {
            vec![TransformStep::Trim, TransformStep::ParseDate]
        }
        t if t.is_numeric() => vec![TransformStep::Trim, TransformStep::ParseNumber],
        FieldType::Boolean => vec![TransformStep::Trim, TransformStep::parse_boolean()],
        FieldType::ObjectId => vec![TransformStep::Trim, TransformStep::ToObjectId],
        _ => vec![TransformStep::Trim],
    };
    transforms.push(TransformStep::NullIfEmpty);

    ColumnMapping::import(&field.name, sanitize_path(&field.name)).with_transforms(transforms)
}

/// Column names become dot-path-safe field names: lowercased, squashed to
/// `[a-z0-9_]`.
pub fn sanitize_path(name: &str) -> String {
    let mut path: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    while path.contains("__") {
        path = path.replace("__", "_");
    }
    let path = path.trim_matches('_').to_string();
    if path.is_empty() { "field".to_string() } else { path }
}
