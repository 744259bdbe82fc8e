//! Form configuration derived from an inferred schema.

use docload_model::{
    FormConfigOptions, FormField, FormFieldType, FormValidation, InferredSchema,
};

/// Map schema columns to form fields, honoring include/exclude filters and
/// per-column widget overrides.
pub fn derive_form_fields(schema: &InferredSchema, options: &FormConfigOptions) -> Vec<FormField> {
    schema
        .fields
        .iter()
        .filter(|field| {
            (options.include.is_empty() || options.include.contains(&field.name))
                && !options.exclude.contains(&field.name)
        })
        .map(|field| {
            let field_type = options
                .overrides
                .get(&field.name)
                .copied()
                .unwrap_or_else(|| FormFieldType::for_field_type(field.field_type));
            let validation = options
                .include_validation
                .then(|| FormValidation {
                    min: field.validation.min,
                    max: field.validation.max,
                    max_length: field.validation.max_length,
                    options: field.validation.options.clone(),
                })
                .filter(|v| {
                    v.min.is_some() || v.max.is_some() || v.max_length.is_some() || v.options.is_some()
                });
            FormField {
                name: field.name.clone(),
                label: label_for(&field.name),
                field_type,
                required: field.is_required,
                validation,
            }
        })
        .collect()
}

/// Human label from a column name: separators to spaces, words capitalized.
fn label_for(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
