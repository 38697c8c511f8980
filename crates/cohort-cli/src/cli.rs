//! CLI argument definitions for the cohort report runner.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use cohort_library::ArtCohortAnalysis;

#[derive(Parser)]
#[command(
    name = "cohort-report",
    version,
    about = "Cohort report runner - Build patient-level cohort reports",
    long_about = "Build a patient-level cohort report from a JSON patient store.\n\n\
                  Selects the cohort for a date range, evaluates every report column\n\
                  per patient and prints the assembled table."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
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

    /// Allow patient-level values in log output.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,

    /// Prefix log lines with a timestamp (pretty and compact formats).
    #[arg(long = "log-timestamps", global = true)]
    pub log_timestamps: bool,

    /// Include the emitting module in log lines.
    #[arg(long = "log-target", global = true)]
    pub log_target: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a report for a date range and print the table.
    Run(RunArgs),

    /// List available reports.
    Reports,

    /// List the columns of a report.
    Columns(ColumnsArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// JSON file holding the patient records.
    #[arg(long = "data", value_name = "PATIENTS_JSON")]
    pub data: PathBuf,

    /// First day of the reporting period (YYYY-MM-DD).
    #[arg(long = "start-date", value_name = "DATE")]
    pub start_date: String,

    /// Last day of the reporting period (YYYY-MM-DD).
    #[arg(long = "end-date", value_name = "DATE")]
    pub end_date: String,

    /// Report to run.
    #[arg(long = "report", default_value = ArtCohortAnalysis::NAME)]
    pub report: String,

    /// How to print the assembled table.
    #[arg(long = "output", value_enum, default_value = "table")]
    pub output: OutputArg,

    /// Worker threads for column evaluation (default: available cores).
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Stop scheduling new cells after this many milliseconds.
    #[arg(long = "timeout-ms", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Display pattern for dates (chrono syntax, default: %d/%m/%Y).
    #[arg(long = "date-format", value_name = "PATTERN")]
    pub date_format: Option<String>,
}

#[derive(Parser)]
pub struct ColumnsArgs {
    /// Report whose columns to list.
    #[arg(long = "report", default_value = ArtCohortAnalysis::NAME)]
    pub report: String,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputArg {
    Table,
    Json,
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
