//! Subcommand implementations.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Table};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use docload_cli::fs_target::FsResolver;
use docload_infer::{infer_schema, suggest_mappings};
use docload_ingest::{ParseOptions, detect_format, parse_content};
use docload_job::{
    CreateJobRequest, ExecuteOptions, FileJobStore, ImportOrchestrator, MemoryJobStore,
    derive_form_fields,
};
use docload_model::{
    ErrorHandling, ErrorStrategy, FileFormat, FormConfigOptions, ImportResults, MappingConfig,
    RowError, SourceFile, TargetRef,
};

use crate::cli::{AnalyzeArgs, FormConfigArgs, ImportArgs, ValidateArgs};

const SHOWN_ERRORS: usize = 10;

pub fn run_analyze(args: &AnalyzeArgs) -> Result<i32> {
    let content = read_source(&args.file)?;
    let mime = mime_for(&args.file);
    let format = detect_format(&content, mime);
    let parsed = parse_content(&content, Some(format), mime, &ParseOptions::sampled(args.sample));
    let schema = infer_schema(&parsed, &source_name(&args.file));

    println!("File: {}", args.file.display());
    println!("Format: {}", describe_format(format));
    println!(
        "Rows: {} total, {} sampled",
        parsed.total_rows,
        parsed.records.len()
    );
    println!("Suggested collection: {}", schema.suggested_collection);
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec![
        header_cell("Column"),
        header_cell("Type"),
        header_cell("Confidence"),
        header_cell("Non-null"),
        header_cell("Unique"),
        header_cell("Notes"),
    ]);
    for field in &schema.fields {
        let mut notes = Vec::new();
        if field.is_required {
            notes.push("required");
        }
        if field.is_unique {
            notes.push("unique");
        }
        if field.validation.options.is_some() {
            notes.push("options");
        }
        table.add_row(vec![
            Cell::new(&field.name),
            Cell::new(format!("{:?}", field.field_type)),
            Cell::new(format!("{:.0}%", field.confidence * 100.0))
                .set_alignment(CellAlignment::Right),
            Cell::new(field.non_null_count).set_alignment(CellAlignment::Right),
            Cell::new(field.unique_count).set_alignment(CellAlignment::Right),
            Cell::new(notes.join(", ")),
        ]);
    }
    println!("{table}");

    for warning in parsed.warnings.iter().chain(&schema.warnings) {
        println!("warning: {warning}");
    }

    if let Some(path) = &args.mappings_out {
        let config = MappingConfig {
            columns: suggest_mappings(&schema),
            ..MappingConfig::default()
        };
        let json = serde_json::to_string_pretty(&config)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write mappings to {}", path.display()))?;
        println!("Suggested mappings written to {}", path.display());
    }
    Ok(0)
}

pub fn run_validate(args: &ValidateArgs) -> Result<i32> {
    let content = read_source(&args.file)?;
    let config = read_mapping(&args.mapping)?;

    // A throwaway in-memory job drives the same dry-run path the real
    // import uses.
    let orchestrator = ImportOrchestrator::new(
        Arc::new(MemoryJobStore::new()),
        Arc::new(FsResolver::new(".")),
    );
    let job = orchestrator.create_job(scratch_request(&args.file))?;
    orchestrator.analyze(&job.import_id, &content)?;
    let outcome = orchestrator.configure_mappings(&job.import_id, config, &content)?;

    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    print_row_errors(&outcome.errors);
    if args.show_documents {
        for document in &outcome.sample_documents {
            println!("{}", serde_json::to_string_pretty(document)?);
        }
    }

    if outcome.valid {
        println!("Mapping is valid.");
        Ok(0)
    } else {
        println!(
            "Mapping produced {} error(s) over the sample.",
            outcome.errors.len()
        );
        Ok(1)
    }
}

pub fn run_import(args: &ImportArgs) -> Result<i32> {
    let content = read_source(&args.file)?;
    let config = read_mapping(&args.mapping)?;
    fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("failed to create data dir {}", args.data_dir.display()))?;

    let store = FileJobStore::new(args.data_dir.join("_jobs"))?;
    let orchestrator = ImportOrchestrator::new(
        Arc::new(store),
        Arc::new(FsResolver::new(&args.data_dir)),
    );

    let job = orchestrator.create_job(CreateJobRequest {
        organization_id: "local".into(),
        created_by: whoami(),
        source_file: source_descriptor(&args.file),
        format: None,
        target: TargetRef {
            vault_id: args.vault.clone(),
            database: args.database.clone(),
            collection: args.collection.clone(),
            create_collection: true,
        },
        error_handling: ErrorHandling {
            strategy: if args.stop_on_error {
                ErrorStrategy::Stop
            } else {
                ErrorStrategy::Skip
            },
            max_errors: args.max_errors,
        },
    })?;
    info!(import_id = %job.import_id, "job created");

    orchestrator.analyze(&job.import_id, &content)?;
    let validation = orchestrator.configure_mappings(&job.import_id, config, &content)?;
    if !validation.valid {
        print_row_errors(&validation.errors);
        for warning in &validation.warnings {
            eprintln!("warning: {warning}");
        }
        bail!("mapping failed validation; aborting before import");
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} rows  {msg} (eta {eta})",
        )?
        .progress_chars("=> "),
    );
    let on_progress = |progress: &docload_model::ImportProgress| {
        bar.set_length(progress.total_rows as u64);
        bar.set_position(progress.processed_rows as u64);
        bar.set_message(format!(
            "{} ok, {} errors, {} skipped",
            progress.success_count, progress.error_count, progress.skip_count
        ));
    };
    let results = orchestrator.execute(
        &job.import_id,
        &content,
        &ExecuteOptions {
            dry_run: args.dry_run,
            on_progress: Some(&on_progress),
            cancel: None,
        },
    )?;
    bar.finish_and_clear();

    print_results(&job.import_id, &results);
    Ok(if results.success_count == 0 && results.error_count > 0 { 1 } else { 0 })
}

pub fn run_form_config(args: &FormConfigArgs) -> Result<i32> {
    let content = read_source(&args.file)?;
    let mime = mime_for(&args.file);
    let parsed = parse_content(&content, None, mime, &ParseOptions::sampled(1000));
    let schema = infer_schema(&parsed, &source_name(&args.file));

    let options = FormConfigOptions {
        exclude: args.exclude.clone(),
        include_validation: args.include_validation,
        ..FormConfigOptions::default()
    };
    let fields = derive_form_fields(&schema, &options);
    let json = serde_json::to_string_pretty(&fields)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("failed to write form config to {}", path.display()))?;
            println!("Form config with {} field(s) written to {}", fields.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(0)
}

// ===== helpers =====

fn read_source(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_mapping(path: &Path) -> Result<MappingConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read mapping {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("invalid mapping configuration in {}", path.display()))
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("import")
        .to_string()
}

fn source_descriptor(path: &Path) -> SourceFile {
    SourceFile {
        name: source_name(path),
        size_bytes: fs::metadata(path).ok().map(|m| m.len()),
        mime_type: mime_for(path).map(String::from),
    }
}

fn scratch_request(path: &Path) -> CreateJobRequest {
    CreateJobRequest {
        organization_id: "local".into(),
        created_by: whoami(),
        source_file: source_descriptor(path),
        format: None,
        target: TargetRef {
            vault_id: "scratch".into(),
            database: "scratch".into(),
            collection: "scratch".into(),
            create_collection: true,
        },
        error_handling: ErrorHandling::default(),
    }
}

fn mime_for(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(|e| e.to_str())? {
        "csv" => Some("text/csv"),
        "tsv" => Some("text/tab-separated-values"),
        "json" => Some("application/json"),
        "jsonl" | "ndjson" => Some("application/x-ndjson"),
        "xlsx" => {
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
        }
        "xls" => Some("application/vnd.ms-excel"),
        _ => None,
    }
}

fn describe_format(format: FileFormat) -> String {
    match format {
        FileFormat::Delimited { delimiter } => {
            format!("delimited (separator {:?})", char::from(delimiter))
        }
        FileFormat::Json => "JSON array".to_string(),
        FileFormat::JsonLines => "JSON lines".to_string(),
        FileFormat::Spreadsheet => "spreadsheet".to_string(),
    }
}

fn whoami() -> String {
    std::env::var("USER").unwrap_or_else(|_| "cli".to_string())
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

fn print_row_errors(errors: &[RowError]) {
    for error in errors.iter().take(SHOWN_ERRORS) {
        match &error.column {
            Some(column) => eprintln!("row {} [{}]: {}", error.row_number, column, error.message),
            None => eprintln!("row {}: {}", error.row_number, error.message),
        }
    }
    if errors.len() > SHOWN_ERRORS {
        eprintln!("... and {} more", errors.len() - SHOWN_ERRORS);
    }
}

fn print_results(import_id: &str, results: &ImportResults) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec![
        header_cell("Rows"),
        header_cell("Imported"),
        header_cell("Errors"),
        header_cell("Skipped"),
        header_cell("Duration"),
    ]);
    table.add_row(vec![
        Cell::new(results.total_rows).set_alignment(CellAlignment::Right),
        Cell::new(results.success_count).set_alignment(CellAlignment::Right),
        Cell::new(results.error_count).set_alignment(CellAlignment::Right),
        Cell::new(results.skip_count).set_alignment(CellAlignment::Right),
        Cell::new(format!("{}ms", results.duration_ms)).set_alignment(CellAlignment::Right),
    ]);
    if results.dry_run {
        println!("Dry run (no documents written), import id {import_id}");
    } else {
        println!("Import id {import_id}");
    }
    println!("{table}");
    print_row_errors(&results.errors);
}
