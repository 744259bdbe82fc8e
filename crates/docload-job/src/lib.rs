//! Import job orchestration.
//!
//! Ties the parser, inference and transform stages into a persistent job
//! lifecycle: `pending -> analyzing -> mapping -> validating -> importing ->
//! {completed | failed | cancelled}`. Storage and the target database are
//! both traits so embedders bring their own backends.

pub mod cache;
pub mod form;
pub mod orchestrator;
pub mod store;
pub mod target;

pub use cache::ConnectionCache;
pub use form::derive_form_fields;
pub use orchestrator::{
    ANALYZE_SAMPLE_ROWS, AnalyzeOutcome, BATCH_SIZE, CreateJobRequest, DeleteOptions,
    ExecuteOptions, IMPORT_ID_FIELD, IMPORTED_AT_FIELD, ImportOrchestrator, PREVIEW_ROWS,
    SAMPLE_DOCUMENTS, VALIDATE_SAMPLE_ROWS, ValidationOutcome,
};
pub use store::{FileJobStore, JobStore, MemoryJobStore};
pub use target::{BulkInsertOutcome, ConnectionResolver, TargetConnection};
