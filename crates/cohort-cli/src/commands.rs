use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use chrono::format::StrftimeItems;
use comfy_table::{Cell, CellAlignment, Table};
use tracing::{info, info_span, warn};

use cohort_cli::logging::log_cell_errors;
use cohort_core::{CancellationToken, ReportAssembler, ReportDefinition, ReportDescriptor};
use cohort_library::{PatientStore, default_registry, find_report, reports};
use cohort_model::{EngineOptions, ParameterValues};

use crate::cli::{ColumnsArgs, RunArgs};
use crate::summary::{apply_table_style, header_cell};
use crate::types::RunResult;

pub fn run_reports() -> Result<()> {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Report"),
        header_cell("Description"),
        header_cell("Parameters"),
    ]);
    apply_table_style(&mut table);
    for report in reports() {
        let parameters: Vec<String> = report
            .parameters()
            .iter()
            .map(|p| format!("{} ({})", p.name, p.parameter_type))
            .collect();
        table.add_row(vec![
            Cell::new(report.name()),
            Cell::new(report.description()),
            Cell::new(parameters.join(", ")),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn run_columns(args: &ColumnsArgs) -> Result<()> {
    let descriptor = lookup_report(&args.report)?;
    // Column specs only need unit names, so an empty store is enough.
    let registry = default_registry(Arc::new(PatientStore::default()));
    let definition = ReportDefinition::from_descriptor(descriptor.as_ref(), &registry)
        .with_context(|| format!("define report {}", args.report))?;
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Column"),
        header_cell("Unit"),
        header_cell("Mapping"),
    ]);
    apply_table_style(&mut table);
    if let Some(column) = table.column_mut(0) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    for (index, column) in definition.columns().iter().enumerate() {
        let mapping: Vec<String> = column
            .mapping()
            .entries()
            .iter()
            .map(|entry| format!("{}=${{{}}}", entry.target, entry.source))
            .collect();
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(column.name().as_str()),
            Cell::new(column.unit().name()),
            Cell::new(mapping.join(", ")),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn run_report(args: &RunArgs) -> Result<RunResult> {
    let span = info_span!("run", report = %args.report);
    let _guard = span.enter();
    let started = Instant::now();

    let descriptor = lookup_report(&args.report)?;
    let options = engine_options(args)?;
    let store = PatientStore::load(&args.data)
        .with_context(|| format!("load patients from {}", args.data.display()))?;
    info!(patients = store.len(), "patient store loaded");

    let values = ParameterValues::parse_raw(
        &descriptor.parameters(),
        [
            ("startDate", args.start_date.as_str()),
            ("endDate", args.end_date.as_str()),
        ],
    )
    .context("parse report parameters")?;

    let assembler =
        ReportAssembler::new(Arc::new(default_registry(Arc::new(store)))).with_options(options);
    let definition = assembler
        .define(descriptor.as_ref())
        .with_context(|| format!("define report {}", args.report))?;
    let output = assembler
        .run(&definition, &values, &CancellationToken::new())
        .with_context(|| format!("run report {}", args.report))?;

    log_cell_errors(&output.errors);
    if !output.is_complete() {
        warn!("report run stopped before every cell was evaluated");
    }
    info!(
        rows = output.table.row_count(),
        columns = output.table.column_count(),
        errors = output.errors.len(),
        "report assembled"
    );
    Ok(RunResult {
        report: definition.name().to_string(),
        data: args.data.clone(),
        output,
        elapsed: started.elapsed(),
    })
}

fn lookup_report(name: &str) -> Result<Box<dyn ReportDescriptor>> {
    find_report(name).ok_or_else(|| {
        let known: Vec<String> = reports().iter().map(|r| r.name().to_string()).collect();
        anyhow!("unknown report '{name}' (available: {})", known.join(", "))
    })
}

fn engine_options(args: &RunArgs) -> Result<EngineOptions> {
    let mut options = EngineOptions::new();
    if let Some(workers) = args.workers {
        options = options.with_workers(workers);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        options = options.with_timeout(Duration::from_millis(timeout_ms));
    }
    if let Some(pattern) = &args.date_format {
        if StrftimeItems::new(pattern).parse().is_err() {
            bail!("invalid date format pattern '{pattern}'");
        }
        options = options.with_date_format(pattern.clone());
    }
    Ok(options)
}
