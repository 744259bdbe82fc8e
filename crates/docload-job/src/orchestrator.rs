//! Import job orchestration.
//!
//! One orchestrator serves many jobs. Each job runs a single sequential
//! batch loop; the only state shared between concurrently executing jobs is
//! the connection cache. The raw file bytes are handed in per call and never
//! persisted on the job record.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use docload_infer::{infer_schema, suggest_mappings};
use docload_ingest::{ParseOptions, parse_content};
use docload_model::{
    ColumnMapping, ErrorHandling, ErrorStrategy, FileFormat, FormConfigOptions, FormField,
    ImportError, ImportJob, ImportPhase, ImportProgress, ImportResults, InferredSchema,
    JobStatus, MAX_ROW_ERRORS, MappingConfig, ParsedRecord, Result, RowError, SourceFile,
    TargetRef,
};
use docload_transform::{BatchOptions, TransformEngine};

use crate::cache::ConnectionCache;
use crate::form::derive_form_fields;
use crate::store::JobStore;
use crate::target::ConnectionResolver;

/// Rows per transform-and-insert batch.
pub const BATCH_SIZE: usize = 100;
/// Rows sampled by `analyze`.
pub const ANALYZE_SAMPLE_ROWS: usize = 1000;
/// Rows returned as the analyze preview.
pub const PREVIEW_ROWS: usize = 10;
/// Rows dry-run by `configure_mappings`.
pub const VALIDATE_SAMPLE_ROWS: usize = 100;
/// Transformed documents returned by `configure_mappings`.
pub const SAMPLE_DOCUMENTS: usize = 5;

/// Document key carrying the import id; also the cleanup key on delete.
pub const IMPORT_ID_FIELD: &str = "_import_id";
/// Document key carrying the insertion timestamp.
pub const IMPORTED_AT_FIELD: &str = "_imported_at";

pub struct CreateJobRequest {
    pub organization_id: String,
    pub created_by: String,
    pub source_file: SourceFile,
    pub format: Option<FileFormat>,
    pub target: TargetRef,
    pub error_handling: ErrorHandling,
}

/// What `analyze` hands back for the mapping UI.
pub struct AnalyzeOutcome {
    pub schema: InferredSchema,
    pub headers: Vec<String>,
    pub preview: Vec<ParsedRecord>,
    pub suggested_mappings: Vec<ColumnMapping>,
    pub total_rows: usize,
}

/// What `configure_mappings` hands back. The config is persisted on the job
/// whether or not `valid` is set.
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<RowError>,
    pub warnings: Vec<String>,
    pub sample_documents: Vec<Map<String, Value>>,
}

#[derive(Default)]
pub struct ExecuteOptions<'a> {
    pub dry_run: bool,
    /// Invoked after each batch's progress has been persisted.
    pub on_progress: Option<&'a (dyn Fn(&ImportProgress) + Send + Sync)>,
    /// Checked at every batch boundary.
    pub cancel: Option<&'a AtomicBool>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    pub delete_imported_data: bool,
}

pub struct ImportOrchestrator {
    store: Arc<dyn JobStore>,
    connections: ConnectionCache,
}

impl ImportOrchestrator {
    pub fn new(store: Arc<dyn JobStore>, resolver: Arc<dyn ConnectionResolver>) -> Self {
        Self {
            store,
            connections: ConnectionCache::new(resolver),
        }
    }

    pub fn job(&self, import_id: &str) -> Result<ImportJob> {
        self.store.get(import_id)
    }

    pub fn list_jobs(&self, organization_id: &str) -> Result<Vec<ImportJob>> {
        self.store.list(organization_id)
    }

    /// Persist a new job descriptor in `pending`.
    pub fn create_job(&self, request: CreateJobRequest) -> Result<ImportJob> {
        let now = Utc::now();
        let job = ImportJob {
            import_id: Uuid::new_v4().to_string(),
            organization_id: request.organization_id,
            created_by: request.created_by,
            source_file: request.source_file,
            format: request.format,
            target: request.target,
            status: JobStatus::Pending,
            progress: ImportProgress::default(),
            error_handling: request.error_handling,
            inferred_schema: None,
            mapping: None,
            results: None,
            form_fields: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };
        self.store.insert(&job)?;
        info!(import_id = %job.import_id, file = %job.source_file.name, "import job created");
        Ok(job)
    }

    /// Parse a bounded sample, infer the schema and move the job to
    /// `mapping`.
    pub fn analyze(&self, import_id: &str, content: &[u8]) -> Result<AnalyzeOutcome> {
        let mut job = self.store.get(import_id)?;
        transition(&mut job, JobStatus::Analyzing)?;
        self.store.update(&job)?;

        let parsed = parse_content(
            content,
            job.format,
            job.source_file.mime_type.as_deref(),
            &ParseOptions::sampled(ANALYZE_SAMPLE_ROWS),
        );
        let schema = infer_schema(&parsed, &job.source_file.name);
        let suggested = suggest_mappings(&schema);
        debug!(
            import_id,
            fields = schema.fields.len(),
            rows = parsed.total_rows,
            "analysis complete"
        );

        job.inferred_schema = Some(schema.clone());
        job.progress.total_rows = parsed.total_rows;
        transition(&mut job, JobStatus::Mapping)?;
        self.store.update(&job)?;

        Ok(AnalyzeOutcome {
            schema,
            headers: parsed.headers.clone(),
            preview: parsed.records.iter().take(PREVIEW_ROWS).cloned().collect(),
            suggested_mappings: suggested,
            total_rows: parsed.total_rows,
        })
    }

    /// Dry-run the mapping over a sample and persist it on the job.
    ///
    /// The config is stored even when invalid so the operator's edits
    /// survive; only a valid config moves the job to `validating`.
    pub fn configure_mappings(
        &self,
        import_id: &str,
        config: MappingConfig,
        content: &[u8],
    ) -> Result<ValidationOutcome> {
        let mut job = self.store.get(import_id)?;
        if !matches!(job.status, JobStatus::Mapping | JobStatus::Validating) {
            return Err(ImportError::IllegalTransition {
                from: job.status,
                to: JobStatus::Validating,
            });
        }

        let mut warnings = Vec::new();
        let key_errors = validate_duplicate_key(&config);

        let parsed = parse_content(
            content,
            job.format,
            job.source_file.mime_type.as_deref(),
            &ParseOptions::sampled(VALIDATE_SAMPLE_ROWS),
        );
        warnings.extend(parsed.warnings.iter().cloned());

        let mut engine = TransformEngine::new(config.clone());
        let outcome =
            engine.transform_batch(&parsed.headers, &parsed.records, BatchOptions::default());

        let mut errors = parsed.errors;
        errors.extend(outcome.errors);

        let valid = errors.is_empty() && key_errors.is_empty();
        warnings.extend(key_errors);
        if outcome.skipped > 0 {
            warnings.push(format!(
                "{} duplicate row(s) would be skipped in the sample",
                outcome.skipped
            ));
        }

        job.mapping = Some(config);
        let next = if valid { JobStatus::Validating } else { JobStatus::Mapping };
        transition(&mut job, next)?;
        self.store.update(&job)?;

        Ok(ValidationOutcome {
            valid,
            errors,
            warnings,
            sample_documents: outcome
                .documents
                .into_iter()
                .take(SAMPLE_DOCUMENTS)
                .collect(),
        })
    }

    /// Run the import end to end.
    ///
    /// Preconditions are checked before any state change; after the job
    /// enters `importing` the run always lands in a terminal status.
    pub fn execute(
        &self,
        import_id: &str,
        content: &[u8],
        options: &ExecuteOptions<'_>,
    ) -> Result<ImportResults> {
        let mut job = self.store.get(import_id)?;
        if job.mapping.is_none() {
            return Err(ImportError::MissingMapping(import_id.to_string()));
        }
        transition(&mut job, JobStatus::Importing)?;
        job.started_at = Some(Utc::now());
        job.completed_at = None;
        job.results = None;
        job.progress = ImportProgress {
            phase: Some(ImportPhase::Parsing),
            ..ImportProgress::default()
        };
        self.store.update(&job)?;

        let connection = if options.dry_run {
            None
        } else {
            match self
                .connections
                .get(&job.organization_id, &job.target.vault_id)
            {
                Ok(connection) => Some(connection),
                Err(error) => {
                    warn!(import_id, %error, "target unreachable, failing job");
                    job.status = JobStatus::Failed;
                    job.completed_at = Some(Utc::now());
                    self.store.update(&job)?;
                    return Err(error);
                }
            }
        };

        let started = Instant::now();
        let total_rows;
        let (run, cancelled) = {
            let outcome = self.run_batches(&mut job, content, connection.as_deref(), options, started);
            match outcome {
                Ok(done) => {
                    total_rows = done.0;
                    (done.1, done.2)
                }
                Err(error) => {
                    // A store or connection error mid-run must not strand
                    // the job in `importing`.
                    warn!(import_id, %error, "import run aborted");
                    job.status = JobStatus::Failed;
                    job.completed_at = Some(Utc::now());
                    self.store.update(&job)?;
                    return Err(error);
                }
            }
        };

        let results = ImportResults {
            total_rows,
            success_count: run.success_count,
            error_count: run.error_count,
            skip_count: run.skip_count,
            errors: run.errors,
            duration_ms: started.elapsed().as_millis() as u64,
            dry_run: options.dry_run,
        };

        let final_status = if cancelled {
            JobStatus::Cancelled
        } else if results.success_count == 0 && results.error_count > 0 {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        job.progress.phase = Some(ImportPhase::Completed);
        job.results = Some(results.clone());
        job.completed_at = Some(Utc::now());
        transition(&mut job, final_status)?;
        self.store.update(&job)?;
        info!(
            import_id,
            status = %final_status,
            success = results.success_count,
            errors = results.error_count,
            skipped = results.skip_count,
            "import run finished"
        );
        Ok(results)
    }

    /// The sequential batch loop: parse, transform, insert, persist
    /// progress. Returns `(total_rows, tally, cancelled)`.
    fn run_batches(
        &self,
        job: &mut ImportJob,
        content: &[u8],
        connection: Option<&dyn crate::target::TargetConnection>,
        options: &ExecuteOptions<'_>,
        started: Instant,
    ) -> Result<(usize, RunTally, bool)> {
        let mapping = job.mapping.clone().unwrap_or_default();
        let error_handling = job.error_handling.clone();
        let parsed = parse_content(
            content,
            job.format,
            job.source_file.mime_type.as_deref(),
            &ParseOptions::default(),
        );

        let total_rows = parsed.records.len();
        let total_batches = total_rows.div_ceil(BATCH_SIZE).max(1);
        let mut engine = TransformEngine::new(mapping);
        let mut run = RunTally::new(parsed.errors);
        let mut collection_ready = false;
        let mut cancelled = false;

        for (batch_index, batch) in parsed.records.chunks(BATCH_SIZE).enumerate() {
            if is_cancelled(options.cancel) {
                cancelled = true;
                break;
            }

            let outcome = engine.transform_batch(
                &parsed.headers,
                batch,
                BatchOptions {
                    stop_on_error: error_handling.strategy == ErrorStrategy::Stop,
                    max_errors: error_handling.max_errors,
                    error_count_so_far: run.error_count,
                },
            );
            let batch_had_errors = !outcome.errors.is_empty();
            run.absorb_batch(&outcome);

            let row_numbers = outcome.row_numbers;
            let mut documents = outcome.documents;
            if let Some(connection) = connection {
                stamp_documents(&mut documents, &job.import_id);
                if !documents.is_empty() {
                    if !collection_ready {
                        self.prepare_collection(connection, &job.target)?;
                        collection_ready = true;
                    }
                    let insert = connection.insert_many(
                        &job.target.database,
                        &job.target.collection,
                        &documents,
                    )?;
                    run.success_count += insert.inserted;
                    for (index, message) in insert.failures {
                        let row = row_numbers.get(index).copied().unwrap_or(0);
                        run.push_error(RowError::new(
                            row,
                            docload_model::ErrorCode::Unknown,
                            format!("insert failed: {message}"),
                        ));
                    }
                }
            } else {
                run.success_count += documents.len();
            }

            job.progress = run.progress(
                total_rows,
                total_batches,
                batch_index + 1,
                started.elapsed().as_secs_f64(),
            );
            self.store.update(job)?;
            if let Some(on_progress) = options.on_progress {
                on_progress(&job.progress);
            }

            if error_handling.strategy == ErrorStrategy::Stop && batch_had_errors {
                info!(import_id = %job.import_id, batch = batch_index, "stopping on first failed batch");
                break;
            }
            if error_handling.max_errors > 0 && run.error_count >= error_handling.max_errors {
                info!(import_id = %job.import_id, errors = run.error_count, "error cap reached, stopping");
                break;
            }
        }

        Ok((total_rows, run, cancelled))
    }

    /// Derive and persist a data-entry form configuration from the inferred
    /// schema.
    pub fn generate_form_config(
        &self,
        import_id: &str,
        options: &FormConfigOptions,
    ) -> Result<Vec<FormField>> {
        let mut job = self.store.get(import_id)?;
        let Some(schema) = &job.inferred_schema else {
            return Err(ImportError::MissingSchema(import_id.to_string()));
        };
        let fields = derive_form_fields(schema, options);
        job.form_fields = Some(fields.clone());
        job.updated_at = Utc::now();
        self.store.update(&job)?;
        Ok(fields)
    }

    /// Cancel a job; legal from non-terminal states only.
    pub fn cancel(&self, import_id: &str) -> Result<ImportJob> {
        let mut job = self.store.get(import_id)?;
        transition(&mut job, JobStatus::Cancelled)?;
        job.completed_at = Some(Utc::now());
        self.store.update(&job)?;
        Ok(job)
    }

    /// Remove the job record, optionally cleaning up inserted documents.
    ///
    /// Cleanup is best-effort: a target failure is logged and the record is
    /// removed anyway.
    pub fn delete(&self, import_id: &str, options: DeleteOptions) -> Result<bool> {
        let job = match self.store.get(import_id) {
            Ok(job) => job,
            Err(ImportError::JobNotFound(_)) => return Ok(false),
            Err(error) => return Err(error),
        };

        if options.delete_imported_data
            && job.results.as_ref().is_some_and(|r| r.success_count > 0 && !r.dry_run)
        {
            match self
                .connections
                .get(&job.organization_id, &job.target.vault_id)
                .and_then(|connection| {
                    connection.delete_by_import_id(
                        &job.target.database,
                        &job.target.collection,
                        import_id,
                    )
                }) {
                Ok(deleted) => info!(import_id, deleted, "imported documents removed"),
                Err(error) => warn!(import_id, %error, "data cleanup failed, removing job anyway"),
            }
        }

        self.store.remove(import_id)
    }

    fn prepare_collection(
        &self,
        connection: &dyn crate::target::TargetConnection,
        target: &TargetRef,
    ) -> Result<()> {
        if !target.create_collection
            || connection.collection_exists(&target.database, &target.collection)?
        {
            return Ok(());
        }
        connection.ensure_collection(&target.database, &target.collection)
    }
}

/// Running totals for one execute call.
struct RunTally {
    success_count: usize,
    error_count: usize,
    skip_count: usize,
    processed_rows: usize,
    errors: Vec<RowError>,
}

impl RunTally {
    fn new(parse_errors: Vec<RowError>) -> Self {
        let mut tally = Self {
            success_count: 0,
            error_count: 0,
            skip_count: 0,
            processed_rows: 0,
            errors: Vec::new(),
        };
        for error in parse_errors {
            tally.push_error(error);
        }
        tally
    }

    fn absorb_batch(&mut self, outcome: &docload_transform::BatchOutcome) {
        self.processed_rows += outcome.processed;
        self.skip_count += outcome.skipped;
        for error in &outcome.errors {
            self.push_error(error.clone());
        }
    }

    fn push_error(&mut self, error: RowError) {
        self.error_count += 1;
        if self.errors.len() < MAX_ROW_ERRORS {
            self.errors.push(error);
        }
    }

    fn progress(
        &self,
        total_rows: usize,
        total_batches: usize,
        current_batch: usize,
        elapsed_secs: f64,
    ) -> ImportProgress {
        let percent = if total_rows == 0 {
            100.0
        } else {
            (self.processed_rows as f64 / total_rows as f64) * 100.0
        };
        let remaining = total_rows.saturating_sub(self.processed_rows);
        let eta_seconds = (self.processed_rows > 0 && remaining > 0).then(|| {
            let per_row = elapsed_secs / self.processed_rows as f64;
            (per_row * remaining as f64).ceil() as u64
        });
        ImportProgress {
            phase: Some(ImportPhase::Inserting),
            total_rows,
            processed_rows: self.processed_rows,
            success_count: self.success_count,
            error_count: self.error_count,
            skip_count: self.skip_count,
            percent_complete: percent,
            current_batch,
            total_batches,
            eta_seconds,
        }
    }
}

/// Check and apply a status transition.
fn transition(job: &mut ImportJob, next: JobStatus) -> Result<()> {
    if !job.status.can_transition_to(next) {
        return Err(ImportError::IllegalTransition {
            from: job.status,
            to: next,
        });
    }
    job.status = next;
    job.updated_at = Utc::now();
    Ok(())
}

fn is_cancelled(flag: Option<&AtomicBool>) -> bool {
    flag.is_some_and(|f| f.load(Ordering::Relaxed))
}

/// Stamp provenance fields onto every outgoing document.
fn stamp_documents(documents: &mut [Map<String, Value>], import_id: &str) {
    let now = Utc::now().to_rfc3339();
    for document in documents {
        document.insert(IMPORT_ID_FIELD.to_string(), Value::String(import_id.to_string()));
        document.insert(IMPORTED_AT_FIELD.to_string(), Value::String(now.clone()));
    }
}

/// A duplicate key may only reference paths produced from source columns;
/// constant computed or static paths would collapse every row into one key.
fn validate_duplicate_key(config: &MappingConfig) -> Vec<String> {
    let Some(key_paths) = &config.duplicate_key else {
        return Vec::new();
    };
    let column_paths: Vec<&str> = config
        .columns
        .iter()
        .flat_map(|mapping| match &mapping.action {
            docload_model::ColumnAction::Skip => Vec::new(),
            docload_model::ColumnAction::Split { targets, .. } => {
                targets.iter().map(String::as_str).collect()
            }
            _ => vec![mapping.target_path.as_str()],
        })
        .collect();
    key_paths
        .iter()
        .filter(|path| !column_paths.contains(&path.as_str()))
        .map(|path| format!("duplicate_key path '{path}' is not produced by any column mapping"))
        .collect()
}
