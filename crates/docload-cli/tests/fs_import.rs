//! Import smoke test over the filesystem target, mirroring `docload import`.

use std::fs;
use std::sync::Arc;

use docload_cli::fs_target::FsResolver;
use docload_job::{
    CreateJobRequest, DeleteOptions, ExecuteOptions, FileJobStore, ImportOrchestrator,
};
use docload_model::{
    ColumnMapping, ErrorHandling, JobStatus, MappingConfig, SourceFile, TargetRef, TransformStep,
};

#[test]
fn import_lands_in_a_jsonl_collection() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileJobStore::new(dir.path().join("_jobs")).unwrap();
    let orchestrator =
        ImportOrchestrator::new(Arc::new(store), Arc::new(FsResolver::new(dir.path())));

    let job = orchestrator
        .create_job(CreateJobRequest {
            organization_id: "local".into(),
            created_by: "test".into(),
            source_file: SourceFile {
                name: "inventory.csv".into(),
                size_bytes: None,
                mime_type: Some("text/csv".into()),
            },
            format: None,
            target: TargetRef {
                vault_id: "default".into(),
                database: "shop".into(),
                collection: "inventory".into(),
                create_collection: true,
            },
            error_handling: ErrorHandling::default(),
        })
        .unwrap();

    let csv = b"sku,qty,price\nA-1,4,9.99\nA-2,0,12.50\nB-7,12,3.25\n";
    orchestrator.analyze(&job.import_id, csv).unwrap();
    let config = MappingConfig {
        columns: vec![
            ColumnMapping::import("sku", "sku"),
            ColumnMapping::import("qty", "quantity")
                .with_transforms(vec![TransformStep::ParseNumber]),
            ColumnMapping::import("price", "price")
                .with_transforms(vec![TransformStep::ParseNumber]),
        ],
        ..MappingConfig::default()
    };
    let validation = orchestrator
        .configure_mappings(&job.import_id, config, csv)
        .unwrap();
    assert!(validation.valid);

    let results = orchestrator
        .execute(&job.import_id, csv, &ExecuteOptions::default())
        .unwrap();
    assert_eq!(results.success_count, 3);

    let collection = dir.path().join("default/shop/inventory.jsonl");
    let contents = fs::read_to_string(&collection).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["sku"], serde_json::json!("A-1"));
    assert_eq!(first["quantity"], serde_json::json!(4));

    // The job record survives on disk and reports completion.
    let reloaded = orchestrator.job(&job.import_id).unwrap();
    assert_eq!(reloaded.status, JobStatus::Completed);

    // Deleting with cleanup empties the collection file.
    orchestrator
        .delete(&job.import_id, DeleteOptions { delete_imported_data: true })
        .unwrap();
    let contents = fs::read_to_string(&collection).unwrap();
    assert!(contents.trim().is_empty());
}
