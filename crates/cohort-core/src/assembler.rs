//! Report assembly.
//!
//! The assembler drives one report run through its states:
//!
//! 1. **Configured** - a validated [`ReportDefinition`] is at hand
//! 2. **ParametersBound** - caller values are type-checked and every column
//!    is bound (all configuration errors surface here)
//! 3. **CohortResolved** - the cohort filter is evaluated exactly once
//! 4. **ColumnsEvaluating** - (patient, column) cells are evaluated on a
//!    worker pool and converted
//! 5. **Assembled** - the table is returned; or **Failed** on any
//!    configuration or cohort error
//!
//! Per-cell computation errors never fail a run; they are recorded in the
//! output next to the table.
//!
//! # Example
//!
//! ```ignore
//! let assembler = ReportAssembler::new(Arc::new(registry));
//! let definition = assembler.define(&ArtCohortAnalysis)?;
//! let output = assembler.run(&definition, &values, &CancellationToken::new())?;
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cohort_model::{
    Cell, CellError, CellStatus, ComputationResult, ConfigurationError, EngineOptions, OutputTable,
    ParameterValues, PatientId, ReportOutput, Row, RunStatus,
};
use crossbeam::channel;
use tracing::{debug, info, info_span, trace, warn};

use crate::binding::{bind_column, bind_report_parameters};
use crate::column::ColumnSpec;
use crate::converter::FormatContext;
use crate::definition::{ReportDescriptor, ReportDefinition};
use crate::error::{Result, RunError};
use crate::registry::Registry;
use crate::unit::{invoke_unit, panic_detail};

/// Lifecycle of a single report run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Configured,
    ParametersBound,
    CohortResolved,
    ColumnsEvaluating,
    Assembled,
    Failed,
}

/// Run-level cancellation: an explicit flag plus an optional deadline.
///
/// Cancellation stops the scheduling of new cells; a cell that is already
/// being evaluated runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// A token sharing this token's flag that also expires at `deadline`.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(self.deadline.map_or(deadline, |current| current.min(deadline))),
        }
    }

    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }
}

/// Runs report definitions against an immutable registry.
pub struct ReportAssembler {
    registry: Arc<Registry>,
    options: EngineOptions,
}

impl ReportAssembler {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            options: EngineOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Validates a descriptor against the registry.
    pub fn define(
        &self,
        descriptor: &dyn ReportDescriptor,
    ) -> std::result::Result<ReportDefinition, ConfigurationError> {
        ReportDefinition::from_descriptor(descriptor, &self.registry)
    }

    /// Starts a run in the `Configured` state.
    pub fn start<'a>(&'a self, definition: &'a ReportDefinition) -> ReportRun<'a> {
        ReportRun {
            options: &self.options,
            definition,
            state: RunState::Configured,
            started: Instant::now(),
            report_values: ParameterValues::new(),
            bound: Vec::new(),
            cohort: Vec::new(),
        }
    }

    /// Runs a report end to end.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when the run ends in the `Failed` state.
    pub fn run(
        &self,
        definition: &ReportDefinition,
        values: &ParameterValues,
        cancel: &CancellationToken,
    ) -> Result<ReportOutput> {
        let span = info_span!("report", report = %definition.name());
        let _guard = span.enter();
        let mut run = self.start(definition);
        run.bind(values)?;
        run.resolve_cohort()?;
        run.evaluate(cancel)
    }
}

/// A single report run and its current state.
pub struct ReportRun<'a> {
    options: &'a EngineOptions,
    definition: &'a ReportDefinition,
    state: RunState,
    started: Instant,
    report_values: ParameterValues,
    bound: Vec<ParameterValues>,
    cohort: Vec<PatientId>,
}

impl ReportRun<'_> {
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The resolved cohort, in row order.
    pub fn cohort(&self) -> &[PatientId] {
        &self.cohort
    }

    /// Parameters bound for the column at `index`.
    pub fn bound_parameters(&self, index: usize) -> Option<&ParameterValues> {
        self.bound.get(index)
    }

    /// `Configured → ParametersBound`: checks caller values and binds every
    /// column before any cohort work starts.
    pub fn bind(&mut self, values: &ParameterValues) -> Result<()> {
        self.expect(RunState::Configured)?;
        let definition = self.definition;
        let report_values = match bind_report_parameters(definition.parameters(), values) {
            Ok(report_values) => report_values,
            Err(error) => return self.fail(error.into()),
        };
        let mut bound = Vec::with_capacity(definition.columns().len());
        for column in definition.columns() {
            match bind_column(column, &report_values) {
                Ok(parameters) => {
                    debug!(
                        column = %column.name(),
                        unit = column.unit().name(),
                        parameters = parameters.len(),
                        "column bound"
                    );
                    bound.push(parameters);
                }
                Err(error) => return self.fail(error.into()),
            }
        }
        self.report_values = report_values;
        self.bound = bound;
        self.transition(RunState::ParametersBound);
        Ok(())
    }

    /// `ParametersBound → CohortResolved`: evaluates the cohort filter once.
    ///
    /// An empty cohort is valid and produces a zero-row table.
    pub fn resolve_cohort(&mut self) -> Result<&[PatientId]> {
        self.expect(RunState::ParametersBound)?;
        let definition = self.definition;
        let spec = definition.cohort();
        let parameters = match spec.resolve_parameters(&self.report_values) {
            Ok(parameters) => parameters,
            Err(error) => return self.fail(error.into()),
        };
        let cohort = match spec.evaluate(&parameters) {
            Ok(cohort) => cohort,
            Err(source) => {
                let filter = spec.filter().name().to_string();
                return self.fail(RunError::Cohort { filter, source });
            }
        };
        info!(
            filter = spec.filter().name(),
            patients = cohort.len(),
            "cohort resolved"
        );
        self.cohort = cohort;
        self.transition(RunState::CohortResolved);
        Ok(&self.cohort)
    }

    /// `CohortResolved → ColumnsEvaluating → Assembled`.
    ///
    /// If `cancel` fires (or the configured timeout, counted from
    /// [`ReportAssembler::start`], elapses) no new cells are scheduled and
    /// the partial table is returned as `Incomplete`. Time spent binding and
    /// resolving the cohort counts against the timeout.
    pub fn evaluate(&mut self, cancel: &CancellationToken) -> Result<ReportOutput> {
        self.expect(RunState::CohortResolved)?;
        self.transition(RunState::ColumnsEvaluating);
        let cancel = match self.options.timeout {
            Some(timeout) => cancel.with_deadline(self.started + timeout),
            None => cancel.clone(),
        };
        let definition = self.definition;
        let columns = definition.columns();
        let grid = evaluate_cells(columns, &self.bound, &self.cohort, self.options, &cancel);

        let width = columns.len();
        let mut table = OutputTable::new(definition.name(), definition.column_names());
        let mut errors = Vec::new();
        let mut complete = true;
        let mut cells = grid.into_iter();
        for &patient in &self.cohort {
            let mut row = Vec::with_capacity(width);
            for (column, cell) in columns.iter().zip(cells.by_ref().take(width)) {
                let cell = cell.unwrap_or_else(|| {
                    complete = false;
                    Cell::not_evaluated()
                });
                if let CellStatus::Error(message) = &cell.status {
                    debug!(column = %column.name(), "computation failed");
                    errors.push(CellError {
                        patient,
                        column: column.name().clone(),
                        message: message.clone(),
                    });
                }
                row.push(cell);
            }
            table.push_row(Row {
                patient,
                cells: row,
            });
        }

        let status = if complete {
            RunStatus::Assembled
        } else {
            warn!("report run cancelled before every cell was evaluated");
            RunStatus::Incomplete
        };
        if !errors.is_empty() {
            warn!(errors = errors.len(), "cells failed to compute");
        }
        info!(
            rows = table.row_count(),
            columns = table.column_count(),
            status = ?status,
            "report assembled"
        );
        self.transition(RunState::Assembled);
        Ok(ReportOutput {
            table,
            status,
            errors,
        })
    }

    fn expect(&self, expected: RunState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RunError::InvalidState {
                expected,
                found: self.state,
            })
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "report run state");
        self.state = next;
    }

    fn fail<T>(&mut self, error: RunError) -> Result<T> {
        warn!(%error, "report run failed");
        self.transition(RunState::Failed);
        Err(error)
    }
}

/// Evaluates every (patient, column) cell into a row-major grid.
///
/// Cells are scheduled column by column in declaration order, patients in
/// cohort order within a column. Each cell is written exactly once, so the
/// grid is identical whatever the worker count. `None` marks cells skipped
/// after cancellation.
fn evaluate_cells(
    columns: &[ColumnSpec],
    bound: &[ParameterValues],
    cohort: &[PatientId],
    options: &EngineOptions,
    cancel: &CancellationToken,
) -> Vec<Option<Cell>> {
    let width = columns.len();
    let height = cohort.len();
    let total = width * height;
    let mut grid = vec![None; total];
    if total == 0 {
        return grid;
    }

    let evaluate = |index: usize| {
        let column = index % width;
        evaluate_cell(&columns[column], &bound[column], cohort[index / width], options)
    };
    let order = (0..width).flat_map(move |column| (0..height).map(move |row| row * width + column));

    let workers = options.worker_count().min(total);
    debug!(cells = total, workers, "evaluating columns");
    if workers <= 1 {
        for index in order {
            if cancel.is_cancelled() {
                break;
            }
            grid[index] = Some(evaluate(index));
        }
        return grid;
    }

    let (task_tx, task_rx) = channel::bounded::<usize>(workers * 2);
    let (cell_tx, cell_rx) = channel::unbounded::<(usize, Cell)>();
    std::thread::scope(|scope| {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let cell_tx = cell_tx.clone();
            let evaluate = &evaluate;
            scope.spawn(move || {
                for index in task_rx.iter() {
                    // drain without evaluating once cancelled
                    if cancel.is_cancelled() {
                        continue;
                    }
                    if cell_tx.send((index, evaluate(index))).is_err() {
                        break;
                    }
                }
            });
        }
        drop(task_rx);
        drop(cell_tx);

        for index in order {
            if cancel.is_cancelled() || task_tx.send(index).is_err() {
                break;
            }
        }
        drop(task_tx);

        for (index, cell) in cell_rx.iter() {
            grid[index] = Some(cell);
        }
    });
    grid
}

fn evaluate_cell(
    column: &ColumnSpec,
    parameters: &ParameterValues,
    patient: PatientId,
    options: &EngineOptions,
) -> Cell {
    let result = invoke_unit(column.unit(), patient, parameters);
    let context = FormatContext::new(parameters, options);
    let converter = column.converter();
    let converted = panic::catch_unwind(AssertUnwindSafe(|| converter.convert(&result, &context)));
    trace!(column = %column.name(), "cell evaluated");
    let display = match converted {
        Ok(display) => display,
        Err(cause) => {
            let message = format!(
                "converter '{}' panicked: {}",
                converter.name(),
                panic_detail(cause.as_ref())
            );
            return Cell::new(context.error, CellStatus::Error(message));
        }
    };
    let status = match result {
        ComputationResult::Present(_) => CellStatus::Present,
        ComputationResult::Absent => CellStatus::Absent,
        ComputationResult::Error(error) => CellStatus::Error(error.message),
    };
    Cell::new(display, status)
}
