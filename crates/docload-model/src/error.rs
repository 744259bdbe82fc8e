use thiserror::Error;

use crate::job::JobStatus;

/// Control-flow failures surfaced to the immediate caller.
///
/// Row-level parse/transform/insert failures are *data* ([`crate::RowError`])
/// and never appear here; this enum covers preconditions, state-machine
/// violations and target-store connectivity.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("import job not found: {0}")]
    JobNotFound(String),

    #[error("job {0} has no mapping configuration; call configure_mappings first")]
    MissingMapping(String),

    #[error("job {0} has no inferred schema; call analyze first")]
    MissingSchema(String),

    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    #[error("invalid mapping configuration: {0}")]
    InvalidConfig(String),

    #[error("target connection not found or access denied: {0}")]
    ConnectionNotFound(String),

    #[error("target connection failed: {0}")]
    Connection(String),

    #[error("job store failure: {0}")]
    Store(String),

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;
