use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use cohort_core::{CancellationToken, ReportAssembler, ReportDefinition};
use cohort_library::{ArtCohortAnalysis, PatientStore, default_registry, find_report, reports};
use cohort_model::{
    CellStatus, EngineOptions, ParameterValues, PatientId, ReportOutput, RunStatus,
};

fn store() -> Arc<PatientStore> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/patients.json");
    Arc::new(PatientStore::load(&path).expect("load fixture"))
}

fn values_2020() -> ParameterValues {
    ParameterValues::new()
        .with("startDate", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
        .with("endDate", NaiveDate::from_ymd_opt(2020, 12, 31).unwrap())
}

fn run(workers: usize) -> ReportOutput {
    let assembler = ReportAssembler::new(Arc::new(default_registry(store())))
        .with_options(EngineOptions::new().with_workers(workers));
    let definition = assembler.define(&ArtCohortAnalysis).expect("valid report");
    assembler
        .run(&definition, &values_2020(), &CancellationToken::new())
        .expect("run report")
}

#[test]
fn registry_contains_every_reference_unit() {
    let registry = default_registry(store());
    // 26 reference units plus the placeholder
    assert_eq!(registry.unit_count(), 27);
    assert_eq!(registry.filter_count(), 1);
}

#[test]
fn art_report_columns_are_unique_and_ordered() {
    let registry = default_registry(store());
    let definition = ReportDefinition::from_descriptor(&ArtCohortAnalysis, &registry).unwrap();
    let names: Vec<String> = definition
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(names.len(), 41);
    assert_eq!(names[0], "id");
    assert_eq!(names[1], "Name");
    assert_eq!(names.last().map(String::as_str), Some("OutCome 60 Months"));
    assert_eq!(
        names.iter().filter(|n| *n == "Change in cd4 count").count(),
        1
    );
}

#[test]
fn report_lookup_by_name() {
    assert_eq!(reports().len(), 1);
    assert!(find_report(ArtCohortAnalysis::NAME).is_some());
    assert!(find_report("pre-art-cohort-analysis").is_none());
}

#[test]
fn cohort_rows_follow_art_start_order() {
    let output = run(4);
    let rows: Vec<u64> = output.table.rows.iter().map(|r| r.patient.get()).collect();
    assert_eq!(rows, vec![2, 1, 5, 3]);
    assert!(output.table.is_rectangular());
    assert_eq!(output.status, RunStatus::Assembled);
}

#[test]
fn demographic_and_transfer_columns() {
    let table = run(2).table;
    assert_eq!(
        table.column_values("Name").unwrap(),
        vec!["Kamau, Peter", "Otieno, Achieng", "Akinyi, Grace", "Wanjiru, "]
    );
    assert_eq!(
        table.column_values("UPN").unwrap(),
        vec!["13939-00002", "13939-00001", "", ""]
    );
    assert_eq!(table.column_values("TI").unwrap(), vec!["Yes", "", "", ""]);
    assert_eq!(table.column_values("Date TI").unwrap(), vec!["01/12/2019", "", "", ""]);
    assert_eq!(table.column_values("TO").unwrap(), vec!["", "", "Yes", ""]);
    assert_eq!(table.column_values("DOB approx").unwrap(), vec!["Yes", "No", "No", ""]);
    assert_eq!(
        table.column_values("Age at ART initiation").unwrap(),
        vec!["45", "31", "24", ""]
    );
    // enrollment after the report end date is not counted
    assert_eq!(
        table.column_values("Enrollment into care date").unwrap(),
        vec!["01/12/2019", "20/11/2019", "", ""]
    );
}

#[test]
fn coded_columns_use_label_tables() {
    let table = run(3).table;
    assert_eq!(
        table.column_values("Initial ART regimen").unwrap(),
        vec!["AZT+3TC+NVP", "TDF+3TC+EFV", "ZZ9X", ""]
    );
    assert_eq!(
        table.column_values("Current ART regimen").unwrap(),
        vec!["TDF+3TC+DTG", "TDF+3TC+EFV", "ZZ9X", ""]
    );
    assert_eq!(
        table
            .column_values("Reason first medically eligible For ART")
            .unwrap(),
        vec!["WHO stage", "CD4 count", "", ""]
    );
}

#[test]
fn outcome_windows_share_one_unit() {
    let table = run(4).table;
    assert_eq!(
        table.column_values("OutCome 6 Months").unwrap(),
        vec!["Lost to follow-up", "Alive and on ART", "Transferred out", "Dead"]
    );
    // 12 months after any 2020 start is past the report end date
    for months in [12, 24, 36, 48, 60] {
        let column = format!("OutCome {months} Months");
        assert_eq!(table.column_values(&column).unwrap(), vec!["", "", "", ""]);
    }
}

#[test]
fn invalid_lab_value_is_a_cell_error() {
    let output = run(2);
    assert_eq!(output.status, RunStatus::Assembled);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].patient, PatientId::new(5));
    assert_eq!(output.errors[0].column.as_str(), "Current cd4 count");
    assert_eq!(
        output.table.column_values("Current cd4 count").unwrap(),
        vec!["", "480", "", ""]
    );
    assert_eq!(
        output
            .table
            .cell_for(PatientId::new(5), "Date current cd4 count")
            .unwrap()
            .display,
        "01/03/2020"
    );
}

#[test]
fn pending_columns_stay_blank() {
    let table = run(4).table;
    for column in [
        "Baseline cd4 count",
        "Date of baseline cd4 percent",
        "Current ART line",
        "Change in cd4 count",
        "Viral suppression",
    ] {
        let index = table.column_index(column).unwrap();
        assert!(
            table
                .rows
                .iter()
                .all(|row| row.cells[index].status == CellStatus::Absent)
        );
    }
}

#[test]
fn parallel_and_sequential_runs_agree() {
    assert_eq!(run(1), run(6));
}

#[test]
fn lab_columns_snapshot() {
    let table = run(2).table;
    let mut text = String::new();
    for column in ["Current cd4 count", "Current cd4 percent", "Current viral load"] {
        let values = table.column_values(column).unwrap();
        text.push_str(&format!("{column}: {values:?}\n"));
    }
    insta::assert_snapshot!(text, @r#"
    Current cd4 count: ["", "480", "", ""]
    Current cd4 percent: ["", "14", "", ""]
    Current viral load: ["", "40", "", ""]
    "#);
}
