//! Record and batch transformation.
//!
//! The engine threads an accumulator of `(value, collected errors)` through
//! every pipeline instead of raising: a step failure degrades the value to
//! `null` and later steps, later columns and later rows all still run.
//! A row is withheld from the output batch only when it produced at least
//! one `REQUIRED_MISSING` error; every other error class still admits the
//! row with partial values.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::trace;

use docload_model::{
    ColumnAction, ColumnMapping, ErrorCode, MappingConfig, ParsedRecord, RowError,
};

use crate::document::{get_path, is_empty_value, set_path, value_text};
use crate::steps::{RawLookup, StepContext, apply_step, substitute};

/// One raw row plus its headers, as seen by template substitution.
pub struct RowView<'a> {
    pub headers: &'a [String],
    pub record: &'a ParsedRecord,
}

impl RawLookup for RowView<'_> {
    fn raw_text(&self, column: &str) -> Option<String> {
        self.record
            .get(self.headers, column)
            .map(value_text)
    }
}

/// Output of one batch transformation.
///
/// `documents.len() + skipped <= processed` always holds; rows excluded for
/// a missing required value are counted in neither bucket.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub documents: Vec<Map<String, Value>>,
    /// Source row number of each admitted document, aligned with
    /// `documents`.
    pub row_numbers: Vec<usize>,
    pub errors: Vec<RowError>,
    /// Rows the engine looked at (the stop rule can leave this short of the
    /// batch length).
    pub processed: usize,
    /// Duplicate-suppressed rows.
    pub skipped: usize,
}

/// Batch-level stop rule. Errors accumulated by earlier batches of the same
/// run are carried in so the cap spans the whole execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    pub stop_on_error: bool,
    pub max_errors: usize,
    pub error_count_so_far: usize,
}

/// Stateful transform engine for one execution run.
///
/// State spans batches: the duplicate-suppression key set and the compiled
/// regex cache both live for the run, so the engine must be fed batches in
/// order by a single caller.
pub struct TransformEngine {
    config: MappingConfig,
    ctx: StepContext,
    seen_keys: HashSet<String>,
}

impl TransformEngine {
    pub fn new(config: MappingConfig) -> Self {
        Self {
            config,
            ctx: StepContext::default(),
            seen_keys: HashSet::new(),
        }
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    /// Transform a batch of parsed records into target documents.
    pub fn transform_batch(
        &mut self,
        headers: &[String],
        records: &[ParsedRecord],
        options: BatchOptions,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for record in records {
            if options.stop_on_error
                && options.max_errors > 0
                && options.error_count_so_far + outcome.errors.len() >= options.max_errors
            {
                break;
            }
            outcome.processed += 1;
            let view = RowView { headers, record };
            let (document, mut errors) = self.transform_record(&view);
            let admitted = !errors
                .iter()
                .any(|e| e.code == ErrorCode::RequiredMissing);
            outcome.errors.append(&mut errors);
            let Some(document) = document else {
                continue;
            };
            if !admitted {
                continue;
            }
            if self.is_duplicate(&document) {
                outcome.skipped += 1;
                trace!(row = record.row_number, "duplicate suppressed");
                continue;
            }
            outcome.row_numbers.push(record.row_number);
            outcome.documents.push(document);
        }
        outcome
    }

    /// Transform one record. The document is returned even when errors
    /// occurred; the caller applies the admission rule.
    fn transform_record(
        &mut self,
        view: &RowView<'_>,
    ) -> (Option<Map<String, Value>>, Vec<RowError>) {
        let mut document = Map::new();
        let mut errors = Vec::new();

        for mapping in &self.config.columns {
            Self::apply_mapping(&mut self.ctx, mapping, view, &mut document, &mut errors);
        }

        for computed in &self.config.computed_fields {
            let text = substitute(&computed.template, view);
            set_path(&mut document, &computed.target_path, Value::String(text));
        }

        // Static constants merge last and may override colliding paths.
        for field in &self.config.static_fields {
            set_path(&mut document, &field.target_path, field.value.clone());
        }

        (Some(document), errors)
    }

    fn apply_mapping(
        ctx: &mut StepContext,
        mapping: &ColumnMapping,
        view: &RowView<'_>,
        document: &mut Map<String, Value>,
        errors: &mut Vec<RowError>,
    ) {
        let row_number = view.record.row_number;
        match &mapping.action {
            ColumnAction::Skip => {}
            ColumnAction::Import => {
                let initial = view
                    .record
                    .get(view.headers, &mapping.source_column)
                    .cloned()
                    .unwrap_or(Value::Null);
                let value = Self::run_pipeline(ctx, mapping, initial, view, errors);
                Self::emit(mapping, &mapping.target_path, value, row_number, document, errors);
            }
            ColumnAction::Merge { sources, separator } => {
                let mut parts: Vec<String> = Vec::with_capacity(sources.len() + 1);
                for column in std::iter::once(&mapping.source_column).chain(sources) {
                    if let Some(value) = view.record.get(view.headers, column) {
                        let text = value_text(value);
                        if !text.trim().is_empty() {
                            parts.push(text.trim().to_string());
                        }
                    }
                }
                let merged = Value::String(parts.join(separator));
                let value = Self::run_pipeline(ctx, mapping, merged, view, errors);
                Self::emit(mapping, &mapping.target_path, value, row_number, document, errors);
            }
            ColumnAction::Split { pattern, targets } => {
                Self::apply_split(ctx, mapping, pattern, targets, view, document, errors);
            }
        }
    }

    /// Extract capture groups into multiple targets; a target whose group
    /// did not participate in the match is silently skipped.
    fn apply_split(
        ctx: &mut StepContext,
        mapping: &ColumnMapping,
        pattern: &str,
        targets: &[String],
        view: &RowView<'_>,
        document: &mut Map<String, Value>,
        errors: &mut Vec<RowError>,
    ) {
        let row_number = view.record.row_number;
        let raw = view
            .record
            .get(view.headers, &mapping.source_column)
            .map(value_text)
            .unwrap_or_default();
        let regex = match ctx.regex(pattern) {
            Ok(regex) => regex.clone(),
            Err(message) => {
                errors.push(
                    RowError::new(row_number, ErrorCode::TransformFailed, message)
                        .with_column(&mapping.source_column),
                );
                return;
            }
        };
        let Some(captures) = regex.captures(&raw) else {
            if mapping.required {
                errors.push(
                    RowError::new(
                        row_number,
                        ErrorCode::RequiredMissing,
                        format!("required split pattern matched nothing in '{raw}'"),
                    )
                    .with_column(&mapping.source_column)
                    .with_value(raw),
                );
            }
            return;
        };
        for (index, target) in targets.iter().enumerate() {
            let Some(group) = captures.get(index + 1) else {
                continue;
            };
            let extracted = Value::String(group.as_str().to_string());
            let value = Self::run_pipeline(ctx, mapping, extracted, view, errors);
            if mapping.skip_if_empty && is_empty_value(&value) {
                continue;
            }
            set_path(document, target, value);
        }
    }

    /// Thread one value through the mapping's steps, degrading to `null` on
    /// a step failure.
    fn run_pipeline(
        ctx: &mut StepContext,
        mapping: &ColumnMapping,
        initial: Value,
        view: &RowView<'_>,
        errors: &mut Vec<RowError>,
    ) -> Value {
        let mut value = initial;
        for step in &mapping.transforms {
            match apply_step(ctx, step, value, view) {
                Ok(next) => value = next,
                Err(message) => {
                    errors.push(
                        RowError::new(
                            view.record.row_number,
                            ErrorCode::TransformFailed,
                            format!("{}: {message}", step.display_name()),
                        )
                        .with_column(&mapping.source_column),
                    );
                    value = Value::Null;
                }
            }
        }
        value
    }

    /// Required/skip-if-empty bookkeeping plus the actual write.
    fn emit(
        mapping: &ColumnMapping,
        target_path: &str,
        value: Value,
        row_number: usize,
        document: &mut Map<String, Value>,
        errors: &mut Vec<RowError>,
    ) {
        let empty = is_empty_value(&value);
        if mapping.required && empty {
            errors.push(
                RowError::new(
                    row_number,
                    ErrorCode::RequiredMissing,
                    format!("required field '{target_path}' is empty after transforms"),
                )
                .with_column(&mapping.source_column),
            );
            return;
        }
        if mapping.skip_if_empty && empty {
            return;
        }
        set_path(document, target_path, value);
    }

    /// Composite key over transformed output paths; first occurrence wins.
    fn is_duplicate(&mut self, document: &Map<String, Value>) -> bool {
        let Some(key_paths) = &self.config.duplicate_key else {
            return false;
        };
        if key_paths.is_empty() {
            return false;
        }
        let key = key_paths
            .iter()
            .map(|path| {
                get_path(document, path)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join("\u{1f}");
        !self.seen_keys.insert(key)
    }
}
