//! Turns an assembled report into printable tables and JSON.

use comfy_table::{Attribute, Cell, Color, Table};

use cohort_model::{CellError, CellStatus, ReportOutput};

/// Header text of the leading patient identifier column.
pub const PATIENT_HEADER: &str = "Patient";

/// Shown in place of cells the run never reached.
pub const NOT_EVALUATED_MARK: &str = "…";

/// Builds the report table: one row per patient, one column per report
/// column, preceded by the patient identifier.
///
/// With `styled`, error cells are red and unevaluated cells dimmed.
pub fn output_table(output: &ReportOutput, styled: bool) -> Table {
    let mut table = Table::new();
    let mut header = vec![header_cell(PATIENT_HEADER, styled)];
    header.extend(
        output
            .table
            .columns
            .iter()
            .map(|column| header_cell(column.as_str(), styled)),
    );
    table.set_header(header);
    for row in &output.table.rows {
        let mut cells = vec![Cell::new(row.patient)];
        cells.extend(row.cells.iter().map(|cell| match &cell.status {
            CellStatus::NotEvaluated => status_cell(NOT_EVALUATED_MARK, Color::DarkGrey, styled),
            CellStatus::Error(_) => status_cell(&cell.display, Color::Red, styled),
            CellStatus::Present | CellStatus::Absent => Cell::new(&cell.display),
        }));
        table.add_row(cells);
    }
    table
}

/// Builds the per-cell error listing.
pub fn error_table(errors: &[CellError], styled: bool) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell(PATIENT_HEADER, styled),
        header_cell("Column", styled),
        header_cell("Message", styled),
    ]);
    for error in errors {
        table.add_row(vec![
            Cell::new(error.patient),
            Cell::new(error.column.as_str()),
            status_cell(&error.message, Color::Red, styled),
        ]);
    }
    table
}

/// Pretty-printed JSON of the whole output, errors and status included.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn output_json(output: &ReportOutput) -> serde_json::Result<String> {
    serde_json::to_string_pretty(output)
}

fn header_cell(label: &str, styled: bool) -> Cell {
    let cell = Cell::new(label);
    if styled {
        cell.fg(Color::Cyan).add_attribute(Attribute::Bold)
    } else {
        cell
    }
}

fn status_cell(text: &str, color: Color, styled: bool) -> Cell {
    let cell = Cell::new(text);
    if styled { cell.fg(color) } else { cell }
}
