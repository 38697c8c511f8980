#![deny(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ColumnName, PatientId};

/// How a cell's display value came about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum CellStatus {
    Present,
    Absent,
    Error(String),
    /// The run was cancelled before this cell was scheduled.
    NotEvaluated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub display: String,
    pub status: CellStatus,
}

impl Cell {
    pub fn new(display: impl Into<String>, status: CellStatus) -> Self {
        Self {
            display: display.into(),
            status,
        }
    }

    pub fn not_evaluated() -> Self {
        Self::new(String::new(), CellStatus::NotEvaluated)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, CellStatus::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub patient: PatientId,
    pub cells: Vec<Cell>,
}

/// The assembled report: one row per cohort member, one cell per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTable {
    pub name: String,
    pub columns: Vec<ColumnName>,
    pub rows: Vec<Row>,
}

impl OutputTable {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnName>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Row) {
        debug_assert_eq!(row.cells.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.as_str() == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row)?.cells.get(column)
    }

    /// Looks up a cell by patient and column display name.
    pub fn cell_for(&self, patient: PatientId, column: &str) -> Option<&Cell> {
        let column = self.column_index(column)?;
        self.rows
            .iter()
            .find(|row| row.patient == patient)?
            .cells
            .get(column)
    }

    /// Display values of one column in row order.
    pub fn column_values(&self, column: &str) -> Option<Vec<&str>> {
        let index = self.column_index(column)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.cells[index].display.as_str())
                .collect(),
        )
    }

    pub fn is_rectangular(&self) -> bool {
        self.rows
            .iter()
            .all(|row| row.cells.len() == self.columns.len())
    }
}

/// Pipe-separated text rendering, header first.
impl fmt::Display for OutputTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header: Vec<&str> = self.columns.iter().map(ColumnName::as_str).collect();
        writeln!(f, "{}", header.join(" | "))?;
        for row in &self.rows {
            let cells: Vec<&str> = row.cells.iter().map(|c| c.display.as_str()).collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every (patient, column) cell was evaluated.
    Assembled,
    /// The run was cancelled or timed out; some cells are `NotEvaluated`.
    Incomplete,
}

/// A per-cell computation failure surfaced alongside the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellError {
    pub patient: PatientId,
    pub column: ColumnName,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOutput {
    pub table: OutputTable,
    pub status: RunStatus,
    pub errors: Vec<CellError>,
}

impl ReportOutput {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Assembled
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
