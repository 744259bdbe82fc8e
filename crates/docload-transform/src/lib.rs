//! Mapping-driven transformation of parsed rows into target documents.
//!
//! [`TransformEngine`] consumes a [`docload_model::MappingConfig`] and turns
//! batches of [`docload_model::ParsedRecord`]s into JSON documents with
//! dot-path nesting, per-row error collection and cross-batch duplicate
//! suppression.

pub mod document;
pub mod engine;
pub mod steps;

pub use document::{get_path, is_empty_value, set_path, value_text};
pub use engine::{BatchOptions, BatchOutcome, RowView, TransformEngine};
pub use steps::{RawLookup, StepContext, apply_step, substitute};
