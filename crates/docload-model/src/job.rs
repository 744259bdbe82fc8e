use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mapping::MappingConfig;
use crate::schema::InferredSchema;

/// Row errors retained per job; later errors are counted but dropped to
/// bound job-record size.
pub const MAX_ROW_ERRORS: usize = 100;

/// Import job state machine.
///
/// `pending -> analyzing -> mapping -> validating -> importing ->
/// {completed|failed|cancelled}`, with `mapping`/`validating` re-entrant
/// while the operator edits the mapping, and `analyzing` re-enterable
/// from either so the schema can be recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Analyzing,
    Mapping,
    Validating,
    Importing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Analyzing) => true,
            (Self::Analyzing, Self::Mapping | Self::Failed) => true,
            // Mapping edits loop the job between mapping and validating;
            // a fresh analysis may be requested from either.
            (Self::Mapping, Self::Analyzing | Self::Mapping | Self::Validating | Self::Importing) => {
                true
            }
            (Self::Validating, Self::Analyzing | Self::Mapping | Self::Validating | Self::Importing) => {
                true
            }
            (Self::Importing, Self::Completed | Self::Failed | Self::Cancelled) => true,
            // Re-running a finished job is permitted; see DESIGN.md.
            (Self::Completed | Self::Failed, Self::Importing) => true,
            (from, Self::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Mapping => "mapping",
            Self::Validating => "validating",
            Self::Importing => "importing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Phase reported inside [`ImportProgress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Parsing,
    Transforming,
    Inserting,
    Completed,
}

/// Row counters and ETA for one execution run.
///
/// At completion `processed_rows == success_count + error_count +
/// skip_count`; `percent_complete` never decreases within one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportProgress {
    pub phase: Option<ImportPhase>,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub skip_count: usize,
    pub percent_complete: f64,
    pub current_batch: usize,
    pub total_batches: usize,
    /// Extrapolated from elapsed time per row so far.
    pub eta_seconds: Option<u64>,
}

/// Error class carried on a [`RowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ParseError,
    TransformFailed,
    RequiredMissing,
    /// Store write failure or catch-all.
    Unknown,
}

/// One row-scoped failure. Errors are data, aggregated and capped, never
/// control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
    pub code: ErrorCode,
}

impl RowError {
    pub fn new(row_number: usize, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            row_number,
            column: None,
            value: None,
            message: message.into(),
            code,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// What to do as row errors accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategy {
    /// Halt after the first batch that produced an error.
    Stop,
    /// Keep going, skipping failed rows.
    #[default]
    Skip,
    /// Keep going; failures are only recorded.
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandling {
    pub strategy: ErrorStrategy,
    pub max_errors: usize,
}

impl Default for ErrorHandling {
    fn default() -> Self {
        Self {
            strategy: ErrorStrategy::default(),
            max_errors: 1000,
        }
    }
}

/// Source file format, detected or caller-supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum FileFormat {
    Delimited { delimiter: u8 },
    Json,
    JsonLines,
    Spreadsheet,
}

impl FileFormat {
    pub fn csv() -> Self {
        Self::Delimited { delimiter: b',' }
    }
}

/// Descriptor of the uploaded source; the job never holds raw bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub size_bytes: Option<u64>,
    pub mime_type: Option<String>,
}

/// Where the documents go. The vault id is opaque here and resolved by an
/// injected connection resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRef {
    pub vault_id: String,
    pub database: String,
    pub collection: String,
    /// Create the collection lazily at execute time if it does not exist.
    #[serde(default)]
    pub create_collection: bool,
}

/// Outcome of one execution run, persisted on the job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResults {
    pub total_rows: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub skip_count: usize,
    /// First [`MAX_ROW_ERRORS`] errors; `error_count` is the true total.
    pub errors: Vec<RowError>,
    pub duration_ms: u64,
    pub dry_run: bool,
}

/// Aggregate root for one user-initiated import. Mutated only by the
/// orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub import_id: String,
    pub organization_id: String,
    pub created_by: String,
    pub source_file: SourceFile,
    pub format: Option<FileFormat>,
    pub target: TargetRef,
    pub status: JobStatus,
    pub progress: ImportProgress,
    pub error_handling: ErrorHandling,
    pub inferred_schema: Option<InferredSchema>,
    pub mapping: Option<MappingConfig>,
    pub results: Option<ImportResults>,
    pub form_fields: Option<Vec<crate::form::FormField>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reject_cancel() {
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Cancelled.can_transition_to(JobStatus::Cancelled));
        assert!(JobStatus::Importing.can_transition_to(JobStatus::Cancelled));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Cancelled));
    }

    #[test]
    fn mapping_loop_is_reentrant() {
        assert!(JobStatus::Mapping.can_transition_to(JobStatus::Validating));
        assert!(JobStatus::Validating.can_transition_to(JobStatus::Mapping));
        assert!(JobStatus::Validating.can_transition_to(JobStatus::Validating));
    }

    #[test]
    fn completed_job_may_reexecute() {
        assert!(JobStatus::Completed.can_transition_to(JobStatus::Importing));
    }

    #[test]
    fn schema_may_be_recomputed_after_analysis() {
        assert!(JobStatus::Mapping.can_transition_to(JobStatus::Analyzing));
        assert!(JobStatus::Validating.can_transition_to(JobStatus::Analyzing));
        assert!(!JobStatus::Importing.can_transition_to(JobStatus::Analyzing));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Analyzing));
    }
}
