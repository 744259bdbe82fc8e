pub mod error;
pub mod form;
pub mod job;
pub mod mapping;
pub mod record;
pub mod schema;

pub use error::{ImportError, Result};
pub use form::{FormConfigOptions, FormField, FormFieldType, FormValidation};
pub use job::{
    ErrorCode, ErrorHandling, ErrorStrategy, FileFormat, ImportJob, ImportPhase, ImportProgress,
    ImportResults, JobStatus, MAX_ROW_ERRORS, RowError, SourceFile, TargetRef,
};
pub use mapping::{
    ColumnAction, ColumnMapping, ComputedField, MappingConfig, StaticField, TransformStep,
};
pub use record::{ParseResult, ParsedRecord};
pub use schema::{
    FieldType, InferredField, InferredSchema, NumericStats, StringStats, SuggestedValidation,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_round_trips_through_json() {
        let job = ImportJob {
            import_id: "imp_1".to_string(),
            organization_id: "org_1".to_string(),
            created_by: "operator".to_string(),
            source_file: SourceFile {
                name: "contacts.csv".to_string(),
                size_bytes: Some(1024),
                mime_type: Some("text/csv".to_string()),
            },
            format: Some(FileFormat::csv()),
            target: TargetRef {
                vault_id: "vault_1".to_string(),
                database: "crm".to_string(),
                collection: "contacts".to_string(),
                create_collection: true,
            },
            status: JobStatus::Pending,
            progress: ImportProgress::default(),
            error_handling: ErrorHandling::default(),
            inferred_schema: None,
            mapping: None,
            results: None,
            form_fields: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        };
        let json = serde_json::to_string(&job).expect("serialize job");
        let round: ImportJob = serde_json::from_str(&json).expect("deserialize job");
        assert_eq!(round.import_id, "imp_1");
        assert_eq!(round.status, JobStatus::Pending);
    }

    #[test]
    fn error_codes_use_screaming_case() {
        let json = serde_json::to_string(&ErrorCode::RequiredMissing).expect("serialize");
        assert_eq!(json, "\"REQUIRED_MISSING\"");
    }
}
