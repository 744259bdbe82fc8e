//! Schema inference: classify each sampled column's type, patterns and
//! stats, then propose a default column-to-field mapping for operator
//! review.

mod engine;
mod patterns;
mod suggest;

pub use engine::infer_schema;
pub use patterns::classify;
pub use suggest::{sanitize_path, suggest_mappings};
