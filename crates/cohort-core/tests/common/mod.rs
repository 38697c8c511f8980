//! Shared fixtures for cohort-core integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use cohort_core::{
    CodedValueConverter, CohortFilter, CohortSpec, ColumnSpec, ComputationUnit, DateConverter,
    FunctionUnit, PLACEHOLDER_UNIT, Registry, ReportDescriptor, TemplateConverter,
};
use cohort_model::{
    CodedValue, ComputationError, ComputationResult, ConfigurationError, ParameterType,
    ParameterValues, PatientId, Payload, ReportParameter, UnitParameter,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn values_2020() -> ParameterValues {
    ParameterValues::new()
        .with("startDate", date(2020, 1, 1))
        .with("endDate", date(2020, 12, 31))
}

/// Selects patients enrolled between `startDate` and `endDate` and counts
/// how often it is evaluated.
pub struct EnrolledBetween {
    enrollments: Vec<(u64, NaiveDate)>,
    evaluations: AtomicUsize,
}

impl EnrolledBetween {
    pub fn new(enrollments: Vec<(u64, NaiveDate)>) -> Self {
        Self {
            enrollments,
            evaluations: AtomicUsize::new(0),
        }
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

impl CohortFilter for EnrolledBetween {
    fn name(&self) -> &str {
        "enrolledBetween"
    }

    fn parameters(&self) -> Vec<UnitParameter> {
        vec![UnitParameter::date("startDate"), UnitParameter::date("endDate")]
    }

    fn evaluate(&self, parameters: &ParameterValues) -> Result<Vec<PatientId>, ComputationError> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        let start = parameters
            .date("startDate")
            .ok_or_else(|| ComputationError::new("startDate missing"))?;
        let end = parameters
            .date("endDate")
            .ok_or_else(|| ComputationError::new("endDate missing"))?;
        Ok(self
            .enrollments
            .iter()
            .filter(|(_, enrolled)| *enrolled >= start && *enrolled <= end)
            .map(|(id, _)| PatientId::new(*id))
            .collect())
    }
}

/// Outcome unit recording each (patient, months) invocation.
#[derive(Default)]
pub struct RecordingOutcome {
    pub calls: Mutex<Vec<(u64, i64)>>,
}

impl ComputationUnit for RecordingOutcome {
    fn name(&self) -> &str {
        "outcome"
    }

    fn required_parameters(&self) -> Vec<UnitParameter> {
        vec![
            UnitParameter::new("months", ParameterType::Integer),
            UnitParameter::date("onDate"),
        ]
    }

    fn evaluate(&self, patient: PatientId, parameters: &ParameterValues) -> ComputationResult {
        let Some(months) = parameters.integer("months") else {
            return ComputationResult::error("months missing");
        };
        if parameters.date("onDate").is_none() {
            return ComputationResult::error("onDate missing");
        }
        self.calls
            .lock()
            .unwrap()
            .push((patient.get(), months));
        let code = if months <= 6 { "ALIVE" } else { "LTFU" };
        ComputationResult::Present(Payload::Coded(CodedValue::new(code)))
    }
}

pub struct Fixture {
    pub filter: Arc<EnrolledBetween>,
    pub outcome: Arc<RecordingOutcome>,
    pub registry: Registry,
}

/// Patients 1, 2, 3 enrolled in 2020; patient 4 in 2018.
pub fn fixture() -> Fixture {
    let filter = Arc::new(EnrolledBetween::new(vec![
        (1, date(2020, 2, 10)),
        (4, date(2018, 7, 1)),
        (2, date(2020, 5, 3)),
        (3, date(2020, 11, 30)),
    ]));
    let outcome = Arc::new(RecordingOutcome::default());
    let registry = Registry::builder()
        .register_filter(filter.clone())
        .register_unit(outcome.clone())
        .register_unit(Arc::new(FunctionUnit::new("patientId", |patient, _| {
            ComputationResult::Present(Payload::Integer(patient.get() as i64))
        })))
        .register_unit(Arc::new(FunctionUnit::new("preferredName", |patient, _| {
            let mut fields = vec![("familyName", Payload::text("Doe"))];
            if patient.get() != 3 {
                fields.push(("givenName", Payload::text(format!("Jane{}", patient.get()))));
            }
            ComputationResult::Present(Payload::record(fields))
        })))
        .register_unit(Arc::new(FunctionUnit::new("isTransferIn", |patient, _| {
            if patient.get() == 1 {
                ComputationResult::Present(Payload::Bool(true))
            } else {
                ComputationResult::Absent
            }
        })))
        .register_unit(Arc::new(FunctionUnit::new("transferInDate", |patient, _| {
            if patient.get() == 1 {
                ComputationResult::Present(Payload::Date(date(2019, 6, 1)))
            } else {
                ComputationResult::Absent
            }
        })))
        .register_unit(Arc::new(FunctionUnit::new("flakyLab", |patient, _| {
            if patient.get() == 2 {
                ComputationResult::error("obs value is not numeric")
            } else {
                ComputationResult::Present(Payload::Decimal(412.5))
            }
        })))
        .build();
    Fixture {
        filter,
        outcome,
        registry,
    }
}

/// Test report shaped after the ART cohort analysis.
pub struct TestReport;

impl ReportDescriptor for TestReport {
    fn name(&self) -> &str {
        "test-cohort"
    }

    fn parameters(&self) -> Vec<ReportParameter> {
        vec![
            ReportParameter::date("startDate", "Start Date"),
            ReportParameter::date("endDate", "End Date"),
        ]
    }

    fn cohort(&self, registry: &Registry) -> Result<CohortSpec, ConfigurationError> {
        CohortSpec::mapped(
            registry.filter("enrolledBetween")?,
            "startDate=${startDate},endDate=${endDate}",
        )
    }

    fn columns(&self, registry: &Registry) -> Result<Vec<ColumnSpec>, ConfigurationError> {
        let outcome = |months: i64| -> Result<ColumnSpec, ConfigurationError> {
            ColumnSpec::new(format!("OutCome {months} Months"), registry.unit("outcome")?)?
                .with_config("months", months)
                .mapped("onDate=${endDate}")
        };
        Ok(vec![
            ColumnSpec::new("id", registry.unit("patientId")?)?,
            ColumnSpec::new("Name", registry.unit("preferredName")?)?
                .with_converter(Arc::new(TemplateConverter::new("{familyName}, {givenName}"))),
            ColumnSpec::new("TI", registry.unit("isTransferIn")?)?,
            ColumnSpec::new("Date TI", registry.unit("transferInDate")?)?
                .with_converter(Arc::new(DateConverter::with_pattern("%Y-%m-%d"))),
            ColumnSpec::new("Baseline cd4 count", registry.unit(PLACEHOLDER_UNIT)?)?,
            ColumnSpec::new("Baseline cd4 percent", registry.unit(PLACEHOLDER_UNIT)?)?,
            ColumnSpec::new("Date of baseline cd4 count", registry.unit(PLACEHOLDER_UNIT)?)?,
            ColumnSpec::new("Lab", registry.unit("flakyLab")?)?,
            outcome(6)?.with_converter(Arc::new(
                CodedValueConverter::new()
                    .with_label("ALIVE", "Alive")
                    .with_label("LTFU", "Lost to follow-up"),
            )),
            outcome(12)?.with_converter(Arc::new(
                CodedValueConverter::new()
                    .with_label("ALIVE", "Alive")
                    .with_label("LTFU", "Lost to follow-up"),
            )),
        ])
    }
}
