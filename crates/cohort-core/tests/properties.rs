//! Property tests for table shape and scheduling independence.

use std::sync::Arc;

use chrono::NaiveDate;
use cohort_core::{
    CancellationToken, CohortFilter, CohortSpec, ColumnSpec, FunctionUnit, Registry,
    ReportAssembler, ReportDefinition,
};
use cohort_model::{
    ComputationError, ComputationResult, EngineOptions, ParameterValues, PatientId, Payload,
    ReportParameter, RunStatus, UnitParameter,
};
use proptest::prelude::*;

struct Listed(Vec<u64>);

impl CohortFilter for Listed {
    fn name(&self) -> &str {
        "listed"
    }

    fn parameters(&self) -> Vec<UnitParameter> {
        vec![UnitParameter::date("endDate")]
    }

    fn evaluate(&self, _parameters: &ParameterValues) -> Result<Vec<PatientId>, ComputationError> {
        Ok(self.0.iter().copied().map(PatientId::new).collect())
    }
}

/// Column `k` yields present, absent or error depending on `(patient + k) % 3`.
fn definition(patients: Vec<u64>, width: usize) -> (Registry, ReportDefinition) {
    let registry = Registry::builder()
        .register_filter(Arc::new(Listed(patients)))
        .register_unit(Arc::new(
            FunctionUnit::new("mixed", |patient, parameters| {
                let k = parameters.integer("k").unwrap_or_default();
                match (patient.get() as i64 + k) % 3 {
                    0 => ComputationResult::Present(Payload::Integer(k * 100 + patient.get() as i64)),
                    1 => ComputationResult::Absent,
                    _ => ComputationResult::error(format!("patient {patient} column {k}")),
                }
            })
            .requires(UnitParameter::new("k", cohort_model::ParameterType::Integer)),
        ))
        .build();
    let cohort = CohortSpec::mapped(registry.filter("listed").unwrap(), "endDate=${endDate}").unwrap();
    let columns = (0..width)
        .map(|k| {
            ColumnSpec::new(format!("c{k}"), registry.unit("mixed").unwrap())
                .unwrap()
                .with_config("k", k as i64)
        })
        .collect();
    let definition = ReportDefinition::new(
        "prop",
        vec![ReportParameter::date("endDate", "End Date")],
        cohort,
        columns,
    )
    .unwrap();
    (registry, definition)
}

fn values() -> ParameterValues {
    ParameterValues::new().with("endDate", NaiveDate::from_ymd_opt(2020, 12, 31).unwrap())
}

proptest! {
    #[test]
    fn table_shape_matches_cohort_and_columns(
        patients in prop::collection::vec(1u64..500, 0..40),
        width in 0usize..8,
        workers in 1usize..6,
    ) {
        let mut unique = patients.clone();
        let mut seen = std::collections::BTreeSet::new();
        unique.retain(|id| seen.insert(*id));

        let (registry, definition) = definition(patients, width);
        let assembler = ReportAssembler::new(Arc::new(registry))
            .with_options(EngineOptions::new().with_workers(workers));
        let output = assembler.run(&definition, &values(), &CancellationToken::new()).unwrap();

        prop_assert_eq!(output.status, RunStatus::Assembled);
        prop_assert!(output.table.is_rectangular());
        prop_assert_eq!(output.table.column_count(), width);
        let rows: Vec<u64> = output.table.rows.iter().map(|r| r.patient.get()).collect();
        prop_assert_eq!(rows, unique);
        let error_cells = output
            .table
            .rows
            .iter()
            .flat_map(|r| &r.cells)
            .filter(|c| c.is_error())
            .count();
        prop_assert_eq!(error_cells, output.errors.len());
    }

    #[test]
    fn output_is_independent_of_worker_count(
        patients in prop::collection::vec(1u64..200, 0..25),
        width in 1usize..6,
        workers in 2usize..8,
    ) {
        let (registry, definition) = definition(patients, width);
        let registry = Arc::new(registry);
        let sequential = ReportAssembler::new(registry.clone())
            .with_options(EngineOptions::sequential())
            .run(&definition, &values(), &CancellationToken::new())
            .unwrap();
        let parallel = ReportAssembler::new(registry)
            .with_options(EngineOptions::new().with_workers(workers))
            .run(&definition, &values(), &CancellationToken::new())
            .unwrap();
        prop_assert_eq!(sequential, parallel);
    }
}
