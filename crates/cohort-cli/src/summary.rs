use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use cohort_cli::render::{error_table, output_json, output_table};
use cohort_model::RunStatus;

use crate::cli::OutputArg;
use crate::types::RunResult;

pub fn print_run(result: &RunResult, format: OutputArg) -> anyhow::Result<()> {
    match format {
        OutputArg::Json => {
            println!("{}", output_json(&result.output)?);
            return Ok(());
        }
        OutputArg::Table => {}
    }
    println!("Report: {}", result.report);
    println!("Data: {}", result.data.display());
    let mut table = output_table(&result.output, true);
    apply_table_style(&mut table);
    println!("{table}");
    print_status(result);
    if result.output.has_errors() {
        let mut errors = error_table(&result.output.errors, true);
        apply_error_table_style(&mut errors);
        println!();
        println!("Cell errors:");
        println!("{errors}");
    }
    Ok(())
}

fn print_status(result: &RunResult) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Patients"),
        header_cell("Columns"),
        header_cell("Cell errors"),
        header_cell("Status"),
        header_cell("Elapsed"),
    ]);
    apply_table_style(&mut table);
    let output = &result.output;
    table.add_row(vec![
        Cell::new(output.table.row_count()).add_attribute(Attribute::Bold),
        Cell::new(output.table.column_count()),
        count_cell(output.errors.len(), Color::Red),
        status_cell(output.status),
        dim_cell(format!("{:.2?}", result.elapsed)),
    ]);
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

fn apply_error_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(160);
}

pub fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn status_cell(status: RunStatus) -> Cell {
    match status {
        RunStatus::Assembled => Cell::new("assembled").fg(Color::Green),
        RunStatus::Incomplete => Cell::new("incomplete")
            .fg(Color::Yellow)
            .add_attribute(Attribute::Bold),
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
