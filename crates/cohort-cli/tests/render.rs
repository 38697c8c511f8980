use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use cohort_cli::render::{NOT_EVALUATED_MARK, error_table, output_json, output_table};
use cohort_core::{CancellationToken, ReportAssembler};
use cohort_library::{ArtCohortAnalysis, PatientStore, default_registry};
use cohort_model::{
    Cell, CellError, CellStatus, ColumnName, EngineOptions, OutputTable, ParameterValues,
    PatientId, ReportOutput, Row, RunStatus,
};

fn small_output() -> ReportOutput {
    let mut table = OutputTable::new("art", vec![ColumnName::new("TI").unwrap()]);
    table.push_row(Row {
        patient: PatientId::new(7),
        cells: vec![Cell::new("Yes", CellStatus::Present)],
    });
    ReportOutput {
        table,
        status: RunStatus::Assembled,
        errors: vec![],
    }
}

#[test]
fn json_output_keeps_status_and_cells() {
    let json = output_json(&small_output()).unwrap();
    insta::assert_snapshot!(json, @r#"
    {
      "table": {
        "name": "art",
        "columns": [
          "TI"
        ],
        "rows": [
          {
            "patient": 7,
            "cells": [
              {
                "display": "Yes",
                "status": {
                  "kind": "Present"
                }
              }
            ]
          }
        ]
      },
      "status": "Assembled",
      "errors": []
    }
    "#);
}

#[test]
fn table_marks_unevaluated_cells() {
    let mut table = OutputTable::new(
        "art",
        vec![ColumnName::new("TI").unwrap(), ColumnName::new("TO").unwrap()],
    );
    table.push_row(Row {
        patient: PatientId::new(3),
        cells: vec![Cell::new("Yes", CellStatus::Present), Cell::not_evaluated()],
    });
    let output = ReportOutput {
        table,
        status: RunStatus::Incomplete,
        errors: vec![],
    };
    let text = output_table(&output, false).to_string();
    assert!(text.contains("Patient"));
    assert!(text.contains("TI"));
    assert!(text.contains("Yes"));
    assert!(text.contains(NOT_EVALUATED_MARK));
}

#[test]
fn error_table_lists_each_failure() {
    let errors = vec![CellError {
        patient: PatientId::new(5),
        column: ColumnName::new("Current cd4 count").unwrap(),
        message: "invalid cd4 count -5".to_string(),
    }];
    let text = error_table(&errors, false).to_string();
    assert!(text.contains("Current cd4 count"));
    assert!(text.contains("invalid cd4 count -5"));
}

#[test]
fn fixture_report_serializes_and_reads_back() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../cohort-library/tests/fixtures/patients.json");
    let store = Arc::new(PatientStore::load(&path).expect("load fixture"));
    let assembler = ReportAssembler::new(Arc::new(default_registry(store)))
        .with_options(EngineOptions::new().with_workers(2));
    let definition = assembler.define(&ArtCohortAnalysis).expect("valid report");
    let values = ParameterValues::new()
        .with("startDate", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
        .with("endDate", NaiveDate::from_ymd_opt(2020, 12, 31).unwrap());
    let output = assembler
        .run(&definition, &values, &CancellationToken::new())
        .expect("run report");

    let json = output_json(&output).unwrap();
    let round: ReportOutput = serde_json::from_str(&json).unwrap();
    assert_eq!(round, output);

    let text = output_table(&output, false).to_string();
    assert!(text.contains("Kamau, Peter"));
    assert!(text.contains("OutCome 60 Months"));
}
