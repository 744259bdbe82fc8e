//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "docload",
    version,
    about = "Bulk-import tabular files into document collections",
    long_about = "Parse CSV/TSV, JSON, JSON-lines and spreadsheet files, infer a schema,\n\
                  map columns through a transform pipeline and load the result into a\n\
                  document collection."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Inspect a file: detected format, inferred schema, suggested mappings.
    Analyze(AnalyzeArgs),

    /// Dry-run a mapping configuration against a sample of the file.
    Validate(ValidateArgs),

    /// Run a full import into a filesystem-backed target.
    Import(ImportArgs),

    /// Derive a data-entry form configuration from the inferred schema.
    FormConfig(FormConfigArgs),
}

#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Source file (CSV/TSV, JSON, JSON-lines or XLSX).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Maximum number of rows to sample.
    #[arg(long, default_value_t = 1000)]
    pub sample: usize,

    /// Write the suggested mapping configuration to this JSON file.
    #[arg(long = "mappings-out", value_name = "PATH")]
    pub mappings_out: Option<PathBuf>,
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// Source file.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Mapping configuration JSON.
    #[arg(long, value_name = "PATH")]
    pub mapping: PathBuf,

    /// Print the sample documents produced by the dry run.
    #[arg(long = "show-documents")]
    pub show_documents: bool,
}

#[derive(Parser)]
pub struct ImportArgs {
    /// Source file.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Mapping configuration JSON.
    #[arg(long, value_name = "PATH")]
    pub mapping: PathBuf,

    /// Root directory holding jobs and target collections.
    #[arg(long = "data-dir", value_name = "DIR")]
    pub data_dir: PathBuf,

    /// Vault (subdirectory) to write into.
    #[arg(long, default_value = "default")]
    pub vault: String,

    /// Target database name.
    #[arg(long)]
    pub database: String,

    /// Target collection name.
    #[arg(long)]
    pub collection: String,

    /// Transform and count without writing any documents.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Halt after the first batch that produced an error.
    #[arg(long = "stop-on-error")]
    pub stop_on_error: bool,

    /// Stop once this many row errors have accumulated.
    #[arg(long = "max-errors", default_value_t = 1000)]
    pub max_errors: usize,
}

#[derive(Parser)]
pub struct FormConfigArgs {
    /// Source file.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Attach min/max/options validation derived from the sample.
    #[arg(long = "include-validation")]
    pub include_validation: bool,

    /// Columns to leave out of the form.
    #[arg(long, value_name = "COLUMN")]
    pub exclude: Vec<String>,

    /// Write the form configuration JSON here instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
