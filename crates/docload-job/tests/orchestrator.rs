//! End-to-end job lifecycle against an in-memory target store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};

use docload_job::{
    BulkInsertOutcome, ConnectionResolver, CreateJobRequest, DeleteOptions, ExecuteOptions,
    IMPORT_ID_FIELD, IMPORTED_AT_FIELD, ImportOrchestrator, MemoryJobStore, TargetConnection,
};
use docload_model::{
    ColumnMapping, ErrorHandling, ErrorStrategy, FieldType, FormConfigOptions, ImportError,
    JobStatus, MappingConfig, SourceFile, TargetRef, TransformStep,
};

// ===== test target =====

#[derive(Default)]
struct MemoryTarget {
    collections: Mutex<HashMap<(String, String), Vec<Map<String, Value>>>>,
    /// Documents containing this key are rejected by `insert_many`.
    poison_field: Option<String>,
    dead: AtomicBool,
}

impl MemoryTarget {
    fn documents(&self, database: &str, collection: &str) -> Vec<Map<String, Value>> {
        self.collections
            .lock()
            .unwrap()
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

impl TargetConnection for MemoryTarget {
    fn ping(&self) -> docload_model::Result<()> {
        if self.dead.load(Ordering::Relaxed) {
            return Err(ImportError::Connection("target offline".into()));
        }
        Ok(())
    }

    fn collection_exists(&self, database: &str, collection: &str) -> docload_model::Result<bool> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .contains_key(&(database.to_string(), collection.to_string())))
    }

    fn ensure_collection(&self, database: &str, collection: &str) -> docload_model::Result<()> {
        self.collections
            .lock()
            .unwrap()
            .entry((database.to_string(), collection.to_string()))
            .or_default();
        Ok(())
    }

    fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: &[Map<String, Value>],
    ) -> docload_model::Result<BulkInsertOutcome> {
        let mut outcome = BulkInsertOutcome::default();
        let mut collections = self.collections.lock().unwrap();
        let stored = collections
            .entry((database.to_string(), collection.to_string()))
            .or_default();
        for (index, document) in documents.iter().enumerate() {
            if let Some(poison) = &self.poison_field
                && document.contains_key(poison)
            {
                outcome.failures.push((index, "document rejected".into()));
                continue;
            }
            stored.push(document.clone());
            outcome.inserted += 1;
        }
        Ok(outcome)
    }

    fn delete_by_import_id(
        &self,
        database: &str,
        collection: &str,
        import_id: &str,
    ) -> docload_model::Result<u64> {
        let mut collections = self.collections.lock().unwrap();
        let Some(stored) = collections.get_mut(&(database.to_string(), collection.to_string()))
        else {
            return Ok(0);
        };
        let before = stored.len();
        stored.retain(|doc| doc.get(IMPORT_ID_FIELD) != Some(&json!(import_id)));
        Ok((before - stored.len()) as u64)
    }
}

struct StaticResolver {
    vault_id: String,
    target: Arc<MemoryTarget>,
}

impl ConnectionResolver for StaticResolver {
    fn resolve(
        &self,
        _organization_id: &str,
        vault_id: &str,
    ) -> docload_model::Result<Arc<dyn TargetConnection>> {
        if vault_id != self.vault_id {
            return Err(ImportError::ConnectionNotFound(vault_id.to_string()));
        }
        Ok(Arc::clone(&self.target) as Arc<dyn TargetConnection>)
    }
}

// ===== fixtures =====

fn harness(target: Arc<MemoryTarget>) -> ImportOrchestrator {
    let resolver = Arc::new(StaticResolver {
        vault_id: "vault-1".into(),
        target,
    });
    ImportOrchestrator::new(Arc::new(MemoryJobStore::new()), resolver)
}

fn create_request() -> CreateJobRequest {
    CreateJobRequest {
        organization_id: "org-1".into(),
        created_by: "tester".into(),
        source_file: SourceFile {
            name: "people.csv".into(),
            size_bytes: None,
            mime_type: Some("text/csv".into()),
        },
        format: None,
        target: TargetRef {
            vault_id: "vault-1".into(),
            database: "app".into(),
            collection: "people".into(),
            create_collection: true,
        },
        error_handling: ErrorHandling::default(),
    }
}

fn people_csv() -> &'static [u8] {
    b"name,age,email\nAlice,30,alice@example.com\nBob,25,bob@example.com\nCara,41,cara@example.com\n"
}

fn people_mapping() -> MappingConfig {
    MappingConfig {
        columns: vec![
            ColumnMapping::import("name", "name"),
            ColumnMapping::import("age", "age")
                .with_transforms(vec![TransformStep::ParseNumber, TransformStep::NullIfEmpty]),
            ColumnMapping::import("email", "contact.email"),
        ],
        ..MappingConfig::default()
    }
}

// ===== lifecycle =====

#[test]
fn full_lifecycle_imports_all_rows() {
    let target = Arc::new(MemoryTarget::default());
    let orchestrator = harness(Arc::clone(&target));

    let job = orchestrator.create_job(create_request()).unwrap();
    assert_eq!(job.status, JobStatus::Pending);

    let analysis = orchestrator.analyze(&job.import_id, people_csv()).unwrap();
    assert_eq!(analysis.total_rows, 3);
    assert_eq!(analysis.preview.len(), 3);
    assert_eq!(analysis.schema.field("age").unwrap().field_type, FieldType::Integer);
    assert_eq!(analysis.schema.field("email").unwrap().field_type, FieldType::Email);
    assert!(!analysis.suggested_mappings.is_empty());
    assert_eq!(
        orchestrator.job(&job.import_id).unwrap().status,
        JobStatus::Mapping
    );

    let validation = orchestrator
        .configure_mappings(&job.import_id, people_mapping(), people_csv())
        .unwrap();
    assert!(validation.valid, "unexpected errors: {:?}", validation.errors);
    assert_eq!(validation.sample_documents.len(), 3);
    assert_eq!(
        orchestrator.job(&job.import_id).unwrap().status,
        JobStatus::Validating
    );

    let results = orchestrator
        .execute(&job.import_id, people_csv(), &ExecuteOptions::default())
        .unwrap();
    assert_eq!(results.success_count, 3);
    assert_eq!(results.error_count, 0);
    assert!(!results.dry_run);

    let stored = orchestrator.job(&job.import_id).unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.completed_at.is_some());
    assert!((stored.progress.percent_complete - 100.0).abs() < f64::EPSILON);

    let documents = target.documents("app", "people");
    assert_eq!(documents.len(), 3);
    assert_eq!(documents[0].get(IMPORT_ID_FIELD), Some(&json!(job.import_id)));
    assert!(documents[0].contains_key(IMPORTED_AT_FIELD));
    assert_eq!(documents[0]["contact"]["email"], json!("alice@example.com"));
    assert_eq!(documents[0]["age"], json!(30));
}

#[test]
fn dry_run_writes_nothing() {
    let target = Arc::new(MemoryTarget::default());
    let orchestrator = harness(Arc::clone(&target));
    let job = orchestrator.create_job(create_request()).unwrap();
    orchestrator.analyze(&job.import_id, people_csv()).unwrap();
    orchestrator
        .configure_mappings(&job.import_id, people_mapping(), people_csv())
        .unwrap();

    let options = ExecuteOptions {
        dry_run: true,
        ..ExecuteOptions::default()
    };
    let results = orchestrator
        .execute(&job.import_id, people_csv(), &options)
        .unwrap();

    assert!(results.dry_run);
    assert_eq!(results.success_count, 3);
    assert!(target.documents("app", "people").is_empty());
}

#[test]
fn execute_without_mapping_is_rejected_without_state_change() {
    let orchestrator = harness(Arc::new(MemoryTarget::default()));
    let job = orchestrator.create_job(create_request()).unwrap();
    orchestrator.analyze(&job.import_id, people_csv()).unwrap();

    let error = orchestrator
        .execute(&job.import_id, people_csv(), &ExecuteOptions::default())
        .unwrap_err();
    assert!(matches!(error, ImportError::MissingMapping(_)));
    assert_eq!(
        orchestrator.job(&job.import_id).unwrap().status,
        JobStatus::Mapping
    );
}

#[test]
fn schema_can_be_recomputed_while_mapping() {
    let orchestrator = harness(Arc::new(MemoryTarget::default()));
    let job = orchestrator.create_job(create_request()).unwrap();
    orchestrator.analyze(&job.import_id, people_csv()).unwrap();
    orchestrator
        .configure_mappings(&job.import_id, people_mapping(), people_csv())
        .unwrap();

    // A fresh upload with an extra column re-runs the analysis.
    let updated = b"name,age,email,active\nAlice,30,alice@example.com,true\n";
    let analysis = orchestrator.analyze(&job.import_id, updated).unwrap();
    assert_eq!(
        analysis.schema.field("active").unwrap().field_type,
        FieldType::Boolean
    );

    let stored = orchestrator.job(&job.import_id).unwrap();
    assert_eq!(stored.status, JobStatus::Mapping);
    assert!(stored.inferred_schema.unwrap().field("active").is_some());
}

#[test]
fn unknown_vault_fails_the_job_and_propagates() {
    let target = Arc::new(MemoryTarget::default());
    let orchestrator = harness(target);
    let mut request = create_request();
    request.target.vault_id = "missing-vault".into();
    let job = orchestrator.create_job(request).unwrap();
    orchestrator.analyze(&job.import_id, people_csv()).unwrap();
    orchestrator
        .configure_mappings(&job.import_id, people_mapping(), people_csv())
        .unwrap();

    let error = orchestrator
        .execute(&job.import_id, people_csv(), &ExecuteOptions::default())
        .unwrap_err();
    assert!(matches!(error, ImportError::ConnectionNotFound(_)));
    assert_eq!(
        orchestrator.job(&job.import_id).unwrap().status,
        JobStatus::Failed
    );
}

#[test]
fn preset_cancel_flag_stops_before_the_first_batch() {
    let target = Arc::new(MemoryTarget::default());
    let orchestrator = harness(Arc::clone(&target));
    let job = orchestrator.create_job(create_request()).unwrap();
    orchestrator.analyze(&job.import_id, people_csv()).unwrap();
    orchestrator
        .configure_mappings(&job.import_id, people_mapping(), people_csv())
        .unwrap();

    let cancel = AtomicBool::new(true);
    let options = ExecuteOptions {
        cancel: Some(&cancel),
        ..ExecuteOptions::default()
    };
    let results = orchestrator
        .execute(&job.import_id, people_csv(), &options)
        .unwrap();

    assert_eq!(results.success_count, 0);
    assert_eq!(
        orchestrator.job(&job.import_id).unwrap().status,
        JobStatus::Cancelled
    );
    assert!(target.documents("app", "people").is_empty());
}

#[test]
fn all_rows_failing_marks_the_job_failed() {
    let target = Arc::new(MemoryTarget::default());
    let orchestrator = harness(target);
    let job = orchestrator.create_job(create_request()).unwrap();
    orchestrator.analyze(&job.import_id, people_csv()).unwrap();

    // Require a column that is empty in every row.
    let config = MappingConfig {
        columns: vec![
            ColumnMapping::import("name", "name"),
            ColumnMapping::import("missing", "missing").required(),
        ],
        ..MappingConfig::default()
    };
    orchestrator
        .configure_mappings(&job.import_id, config, people_csv())
        .unwrap();

    let results = orchestrator
        .execute(&job.import_id, people_csv(), &ExecuteOptions::default())
        .unwrap();
    assert_eq!(results.success_count, 0);
    assert_eq!(results.error_count, 3);
    assert_eq!(
        orchestrator.job(&job.import_id).unwrap().status,
        JobStatus::Failed
    );
}

#[test]
fn insert_rejections_become_unknown_errors() {
    let target = Arc::new(MemoryTarget {
        poison_field: Some("reject_me".into()),
        ..MemoryTarget::default()
    });
    let orchestrator = harness(Arc::clone(&target));
    let job = orchestrator.create_job(create_request()).unwrap();
    orchestrator.analyze(&job.import_id, people_csv()).unwrap();

    let config = MappingConfig {
        columns: vec![ColumnMapping::import("name", "name")],
        static_fields: vec![docload_model::StaticField {
            target_path: "reject_me".into(),
            value: json!(true),
        }],
        ..MappingConfig::default()
    };
    orchestrator
        .configure_mappings(&job.import_id, config, people_csv())
        .unwrap();

    let results = orchestrator
        .execute(&job.import_id, people_csv(), &ExecuteOptions::default())
        .unwrap();
    assert_eq!(results.success_count, 0);
    assert_eq!(results.error_count, 3);
    assert!(
        results
            .errors
            .iter()
            .all(|e| e.code == docload_model::ErrorCode::Unknown)
    );
    // Failures point back at the source rows that produced the documents.
    let rows: Vec<usize> = results.errors.iter().map(|e| e.row_number).collect();
    assert_eq!(rows, vec![1, 2, 3]);
}

#[test]
fn stop_strategy_halts_after_first_failed_batch() {
    let target = Arc::new(MemoryTarget::default());
    let orchestrator = harness(target);
    let mut request = create_request();
    request.error_handling = ErrorHandling {
        strategy: ErrorStrategy::Stop,
        max_errors: 1000,
    };
    let job = orchestrator.create_job(request).unwrap();

    // 150 rows, an invalid date in row 10; batch 1 errors, batch 2 never runs.
    let mut csv = String::from("name,joined\n");
    for i in 0..150 {
        let joined = if i == 9 { "not-a-date" } else { "2024-01-15" };
        csv.push_str(&format!("person{i},{joined}\n"));
    }
    orchestrator.analyze(&job.import_id, csv.as_bytes()).unwrap();
    let config = MappingConfig {
        columns: vec![
            ColumnMapping::import("name", "name"),
            ColumnMapping::import("joined", "joined")
                .with_transforms(vec![TransformStep::ParseDate]),
        ],
        ..MappingConfig::default()
    };
    orchestrator
        .configure_mappings(&job.import_id, config, csv.as_bytes())
        .unwrap();

    let results = orchestrator
        .execute(&job.import_id, csv.as_bytes(), &ExecuteOptions::default())
        .unwrap();
    // The erroring row still produced a document; only the second batch is cut.
    assert_eq!(results.error_count, 1);
    assert_eq!(results.success_count, 100);
    assert_eq!(results.total_rows, 150);
}

#[test]
fn duplicate_key_suppression_spans_batches() {
    let target = Arc::new(MemoryTarget::default());
    let orchestrator = harness(Arc::clone(&target));
    let job = orchestrator.create_job(create_request()).unwrap();

    // 120 rows, every email appears twice; only the first 60 survive.
    let mut csv = String::from("name,email\n");
    for i in 0..120 {
        csv.push_str(&format!("person{i},user{}@example.com\n", i % 60));
    }
    orchestrator.analyze(&job.import_id, csv.as_bytes()).unwrap();
    let config = MappingConfig {
        columns: vec![
            ColumnMapping::import("name", "name"),
            ColumnMapping::import("email", "email"),
        ],
        duplicate_key: Some(vec!["email".into()]),
        ..MappingConfig::default()
    };
    orchestrator
        .configure_mappings(&job.import_id, config, csv.as_bytes())
        .unwrap();

    let results = orchestrator
        .execute(&job.import_id, csv.as_bytes(), &ExecuteOptions::default())
        .unwrap();
    assert_eq!(results.success_count, 60);
    assert_eq!(results.skip_count, 60);
    assert_eq!(target.documents("app", "people").len(), 60);
}

#[test]
fn invalid_duplicate_key_fails_validation_but_persists_config() {
    let orchestrator = harness(Arc::new(MemoryTarget::default()));
    let job = orchestrator.create_job(create_request()).unwrap();
    orchestrator.analyze(&job.import_id, people_csv()).unwrap();

    let config = MappingConfig {
        columns: vec![ColumnMapping::import("name", "name")],
        duplicate_key: Some(vec!["nonexistent".into()]),
        ..MappingConfig::default()
    };
    let outcome = orchestrator
        .configure_mappings(&job.import_id, config, people_csv())
        .unwrap();

    assert!(!outcome.valid);
    assert!(outcome.warnings.iter().any(|w| w.contains("nonexistent")));
    let stored = orchestrator.job(&job.import_id).unwrap();
    assert!(stored.mapping.is_some());
    assert_eq!(stored.status, JobStatus::Mapping);
}

#[test]
fn progress_callback_sees_monotonic_percent() {
    let target = Arc::new(MemoryTarget::default());
    let orchestrator = harness(target);
    let job = orchestrator.create_job(create_request()).unwrap();

    let mut csv = String::from("name\n");
    for i in 0..250 {
        csv.push_str(&format!("person{i}\n"));
    }
    orchestrator.analyze(&job.import_id, csv.as_bytes()).unwrap();
    orchestrator
        .configure_mappings(
            &job.import_id,
            MappingConfig {
                columns: vec![ColumnMapping::import("name", "name")],
                ..MappingConfig::default()
            },
            csv.as_bytes(),
        )
        .unwrap();

    let seen = Mutex::new(Vec::new());
    let on_progress = |progress: &docload_model::ImportProgress| {
        seen.lock().unwrap().push(progress.percent_complete);
    };
    let options = ExecuteOptions {
        on_progress: Some(&on_progress),
        ..ExecuteOptions::default()
    };
    orchestrator
        .execute(&job.import_id, csv.as_bytes(), &options)
        .unwrap();

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert!((seen[2] - 100.0).abs() < f64::EPSILON);
}

// ===== form config and deletion =====

#[test]
fn form_config_requires_a_schema() {
    let orchestrator = harness(Arc::new(MemoryTarget::default()));
    let job = orchestrator.create_job(create_request()).unwrap();
    let error = orchestrator
        .generate_form_config(&job.import_id, &FormConfigOptions::default())
        .unwrap_err();
    assert!(matches!(error, ImportError::MissingSchema(_)));
}

#[test]
fn form_config_maps_types_and_persists() {
    let orchestrator = harness(Arc::new(MemoryTarget::default()));
    let job = orchestrator.create_job(create_request()).unwrap();
    orchestrator.analyze(&job.import_id, people_csv()).unwrap();

    let fields = orchestrator
        .generate_form_config(&job.import_id, &FormConfigOptions::default())
        .unwrap();
    let age = fields.iter().find(|f| f.name == "age").unwrap();
    assert_eq!(age.field_type, docload_model::FormFieldType::Number);
    assert_eq!(age.label, "Age");

    let stored = orchestrator.job(&job.import_id).unwrap();
    assert_eq!(stored.form_fields.as_ref().unwrap().len(), fields.len());
}

#[test]
fn delete_with_cleanup_removes_imported_documents() {
    let target = Arc::new(MemoryTarget::default());
    let orchestrator = harness(Arc::clone(&target));
    let job = orchestrator.create_job(create_request()).unwrap();
    orchestrator.analyze(&job.import_id, people_csv()).unwrap();
    orchestrator
        .configure_mappings(&job.import_id, people_mapping(), people_csv())
        .unwrap();
    orchestrator
        .execute(&job.import_id, people_csv(), &ExecuteOptions::default())
        .unwrap();
    assert_eq!(target.documents("app", "people").len(), 3);

    let removed = orchestrator
        .delete(&job.import_id, DeleteOptions { delete_imported_data: true })
        .unwrap();
    assert!(removed);
    assert!(target.documents("app", "people").is_empty());
    assert!(matches!(
        orchestrator.job(&job.import_id).unwrap_err(),
        ImportError::JobNotFound(_)
    ));
}

#[test]
fn cancel_is_illegal_from_terminal_states() {
    let orchestrator = harness(Arc::new(MemoryTarget::default()));
    let job = orchestrator.create_job(create_request()).unwrap();
    orchestrator.analyze(&job.import_id, people_csv()).unwrap();
    orchestrator
        .configure_mappings(&job.import_id, people_mapping(), people_csv())
        .unwrap();
    let options = ExecuteOptions {
        dry_run: true,
        ..ExecuteOptions::default()
    };
    orchestrator
        .execute(&job.import_id, people_csv(), &options)
        .unwrap();

    let error = orchestrator.cancel(&job.import_id).unwrap_err();
    assert!(matches!(error, ImportError::IllegalTransition { .. }));
}

#[test]
fn completed_job_can_be_rerun() {
    let target = Arc::new(MemoryTarget::default());
    let orchestrator = harness(Arc::clone(&target));
    let job = orchestrator.create_job(create_request()).unwrap();
    orchestrator.analyze(&job.import_id, people_csv()).unwrap();
    orchestrator
        .configure_mappings(&job.import_id, people_mapping(), people_csv())
        .unwrap();

    orchestrator
        .execute(&job.import_id, people_csv(), &ExecuteOptions::default())
        .unwrap();
    let second = orchestrator
        .execute(&job.import_id, people_csv(), &ExecuteOptions::default())
        .unwrap();

    assert_eq!(second.success_count, 3);
    assert_eq!(target.documents("app", "people").len(), 6);
}
