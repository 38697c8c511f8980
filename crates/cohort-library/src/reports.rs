//! Report descriptors shipped with the library.

use std::sync::Arc;

use cohort_core::{
    CodedValueConverter, CohortSpec, ColumnSpec, DateConverter, FieldConverter,
    PLACEHOLDER_UNIT, Registry, ReportDescriptor, ResultConverter, TemplateConverter,
};
use cohort_model::{ConfigurationError, ReportParameter, UnitParameter};

use crate::filter::ART_COHORT_FILTER;
use crate::units::{names, outcome};

/// Display labels for ART regimen codes.
pub const REGIMEN_LABELS: &[(&str, &str)] = &[
    ("AF1A", "AZT+3TC+NVP"),
    ("AF1B", "AZT+3TC+EFV"),
    ("AF2A", "TDF+3TC+NVP"),
    ("AF2B", "TDF+3TC+EFV"),
    ("AF2E", "TDF+3TC+DTG"),
    ("AS1A", "AZT+3TC+LPV/r"),
    ("AS2A", "TDF+3TC+LPV/r"),
];

/// Display labels for the reason a patient first became eligible for ART.
pub const ELIGIBILITY_LABELS: &[(&str, &str)] = &[
    ("CD4", "CD4 count"),
    ("CD4_PERCENT", "CD4 percentage"),
    ("WHO_STAGE", "WHO stage"),
    ("PREGNANT", "Pregnant"),
    ("BREASTFEEDING", "Breastfeeding"),
    ("TB", "TB co-infection"),
    ("HEP_B", "HBV co-infection"),
];

pub const OUTCOME_LABELS: &[(&str, &str)] = &[
    (outcome::ALIVE, "Alive and on ART"),
    (outcome::DEAD, "Dead"),
    (outcome::TRANSFERRED_OUT, "Transferred out"),
    (outcome::LOST_TO_FOLLOW_UP, "Lost to follow-up"),
];

/// Outcome windows reported, in months after ART start.
pub const OUTCOME_WINDOWS: [i64; 6] = [6, 12, 24, 36, 48, 60];

/// Columns with no computation behind them yet.
const PENDING_COLUMNS: [&str; 10] = [
    "Baseline cd4 count",
    "Date of baseline cd4 count",
    "Baseline cd4 percent",
    "Date of baseline cd4 percent",
    "Current ART line",
    "Change in cd4 count",
    "Cd4 count improvement",
    "Change in cd4 percent",
    "Cd4 percent improvement",
    "Viral suppression",
];

/// ART cohort analysis: patients starting ART in a date range with their
/// demographics, transfer status, regimens, labs, visits and outcomes at
/// 6 to 60 months.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtCohortAnalysis;

impl ArtCohortAnalysis {
    pub const NAME: &str = "art-cohort-analysis";
}

impl ReportDescriptor for ArtCohortAnalysis {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "ART cohort analysis for patients starting ART between two dates"
    }

    fn parameters(&self) -> Vec<ReportParameter> {
        vec![
            ReportParameter::date("startDate", "Start Date"),
            ReportParameter::date("endDate", "End Date"),
        ]
    }

    fn cohort(&self, registry: &Registry) -> Result<CohortSpec, ConfigurationError> {
        CohortSpec::mapped(
            registry.filter(ART_COHORT_FILTER)?,
            "startDate=${startDate},endDate=${endDate}",
        )
    }

    fn columns(&self, registry: &Registry) -> Result<Vec<ColumnSpec>, ConfigurationError> {
        let column = |name: &str, unit: &str| -> Result<ColumnSpec, ConfigurationError> {
            ColumnSpec::new(name, registry.unit(unit)?)
        };
        let pending = |name: &str| -> Result<ColumnSpec, ConfigurationError> {
            ColumnSpec::new(name, registry.unit(PLACEHOLDER_UNIT)?)
        };
        let date = || -> Arc<dyn ResultConverter> { Arc::new(DateConverter::new()) };
        let regimen = || -> Arc<dyn ResultConverter> {
            Arc::new(CodedValueConverter::new().with_labels(REGIMEN_LABELS.iter().copied()))
        };

        let mut columns = vec![
            column("id", names::PATIENT_ID)?,
            column("Name", names::PREFERRED_NAME)?
                .with_converter(Arc::new(TemplateConverter::new("{familyName}, {givenName}"))),
            column("UPN", names::UPN)?
                .with_converter(Arc::new(TemplateConverter::new("{identifier}"))),
            column("Enrollment into care date", names::ENROLLMENT_DATE)?
                .with_parameter(UnitParameter::date("onDate"))
                .mapped("onDate=${endDate}")?
                .with_converter(date()),
            column("DOB", names::BIRTHDATE)?.with_converter(date()),
            column("DOB approx", names::BIRTHDATE_ESTIMATED)?,
            column("Age at ART initiation", names::AGE_AT_ART_INITIATION)?,
            column("Sex", names::GENDER)?,
            column("TI", names::IS_TRANSFER_IN)?,
            column("Date TI", names::TRANSFER_IN_DATE)?.with_converter(date()),
            column("TO", names::IS_TRANSFER_OUT)?,
            column("Date TO", names::TRANSFER_OUT_DATE)?.with_converter(date()),
            column("ARV Start Date", names::ART_START_DATE)?.with_converter(date()),
            column("Reason first medically eligible For ART", names::MEDICALLY_ELIGIBLE)?
                .with_converter(Arc::new(FieldConverter::new(
                    "reason",
                    Arc::new(
                        CodedValueConverter::new().with_labels(ELIGIBILITY_LABELS.iter().copied()),
                    ),
                ))),
        ];
        for &name in &PENDING_COLUMNS[..4] {
            columns.push(pending(name)?);
        }
        columns.push(
            column("Initial ART regimen", names::INITIAL_REGIMEN)?.with_converter(regimen()),
        );
        columns.push(
            column("Current ART regimen", names::CURRENT_REGIMEN)?.with_converter(regimen()),
        );
        columns.push(pending(PENDING_COLUMNS[4])?);
        columns.push(column("Current cd4 count", names::LAST_CD4_COUNT)?);
        columns.push(
            column("Date current cd4 count", names::LAST_CD4_COUNT_DATE)?.with_converter(date()),
        );
        columns.push(column("Current cd4 percent", names::LAST_CD4_PERCENT)?);
        columns.push(
            column("Date current cd4 percent", names::LAST_CD4_PERCENT_DATE)?.with_converter(date()),
        );
        for &name in &PENDING_COLUMNS[5..9] {
            columns.push(pending(name)?);
        }
        columns.push(column("Current viral load", names::LAST_VIRAL_LOAD)?);
        columns.push(
            column("Date of current viral load", names::LAST_VIRAL_LOAD_DATE)?.with_converter(date()),
        );
        columns.push(pending(PENDING_COLUMNS[9])?);
        columns.push(
            column("Date of Last visit", names::LAST_VISIT_DATE)?.with_converter(date()),
        );
        columns.push(
            column("Date of expected next visit", names::NEXT_APPOINTMENT_DATE)?
                .with_converter(date()),
        );
        columns.push(column("Date of death", names::DEATH_DATE)?.with_converter(date()));

        // one outcome unit instance, one column per window
        for months in OUTCOME_WINDOWS {
            columns.push(
                column(&format!("OutCome {months} Months"), names::OUTCOME)?
                    .with_config("months", months)
                    .mapped("onDate=${endDate}")?
                    .with_converter(Arc::new(
                        CodedValueConverter::new().with_labels(OUTCOME_LABELS.iter().copied()),
                    )),
            );
        }
        Ok(columns)
    }
}

/// Every report this library can build.
pub fn reports() -> Vec<Box<dyn ReportDescriptor>> {
    vec![Box::new(ArtCohortAnalysis)]
}

/// Looks a report up by name.
pub fn find_report(name: &str) -> Option<Box<dyn ReportDescriptor>> {
    reports().into_iter().find(|report| report.name() == name)
}
