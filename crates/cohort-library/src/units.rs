//! Reference computation units backed by the patient store.
//!
//! Each unit is a plain record lookup wrapped in [`StoreUnit`]. A patient
//! missing from the store is an `Error` cell; missing data on a known
//! patient is `Absent`.

use std::sync::Arc;

use chrono::{Months, NaiveDate};
use cohort_core::ComputationUnit;
use cohort_model::{
    CodedValue, ComputationError, ComputationResult, ParameterType, ParameterValues, PatientId,
    Payload, UnitParameter,
};

use crate::store::{Observation, PatientRecord, PatientStore, latest};

/// Registry names of the reference units.
pub mod names {
    pub const PATIENT_ID: &str = "patientId";
    pub const PREFERRED_NAME: &str = "preferredName";
    pub const UPN: &str = "uniquePatientNumber";
    pub const ENROLLMENT_DATE: &str = "dateOfEnrollment";
    pub const BIRTHDATE: &str = "birthdate";
    pub const BIRTHDATE_ESTIMATED: &str = "isBirthdateApproximated";
    pub const AGE_AT_ART_INITIATION: &str = "ageAtArtInitiation";
    pub const GENDER: &str = "gender";
    pub const IS_TRANSFER_IN: &str = "isTransferIn";
    pub const TRANSFER_IN_DATE: &str = "transferInDate";
    pub const IS_TRANSFER_OUT: &str = "isTransferOut";
    pub const TRANSFER_OUT_DATE: &str = "transferOutDate";
    pub const ART_START_DATE: &str = "artStartDate";
    pub const MEDICALLY_ELIGIBLE: &str = "firstMedicallyEligibleForArt";
    pub const INITIAL_REGIMEN: &str = "initialArtRegimen";
    pub const CURRENT_REGIMEN: &str = "currentArtRegimen";
    pub const LAST_CD4_COUNT: &str = "lastCd4Count";
    pub const LAST_CD4_COUNT_DATE: &str = "lastCd4CountDate";
    pub const LAST_CD4_PERCENT: &str = "lastCd4Percent";
    pub const LAST_CD4_PERCENT_DATE: &str = "lastCd4PercentDate";
    pub const LAST_VIRAL_LOAD: &str = "lastViralLoad";
    pub const LAST_VIRAL_LOAD_DATE: &str = "lastViralLoadDate";
    pub const LAST_VISIT_DATE: &str = "dateLastSeen";
    pub const NEXT_APPOINTMENT_DATE: &str = "lastReturnVisitDate";
    pub const DEATH_DATE: &str = "dateOfDeath";
    pub const OUTCOME: &str = "artOutcome";
}

/// Days past a missed appointment after which a patient counts as lost to
/// follow-up.
pub const LTFU_GRACE_DAYS: i64 = 90;

/// Outcome codes returned by the outcome unit.
pub mod outcome {
    pub const ALIVE: &str = "ALIVE";
    pub const DEAD: &str = "DEAD";
    pub const TRANSFERRED_OUT: &str = "TO";
    pub const LOST_TO_FOLLOW_UP: &str = "LTFU";
}

type LookupFn = fn(&PatientRecord, &ParameterValues) -> Result<Option<Payload>, ComputationError>;

/// A unit that looks a value up on the patient's store record.
pub struct StoreUnit {
    name: &'static str,
    parameters: Vec<UnitParameter>,
    store: Arc<PatientStore>,
    lookup: LookupFn,
}

impl StoreUnit {
    pub fn new(name: &'static str, store: Arc<PatientStore>, lookup: LookupFn) -> Self {
        Self {
            name,
            parameters: Vec::new(),
            store,
            lookup,
        }
    }

    #[must_use]
    pub fn requires(mut self, parameter: UnitParameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

impl ComputationUnit for StoreUnit {
    fn name(&self) -> &str {
        self.name
    }

    fn required_parameters(&self) -> Vec<UnitParameter> {
        self.parameters.clone()
    }

    fn evaluate(&self, patient: PatientId, parameters: &ParameterValues) -> ComputationResult {
        match self.store.patient(patient) {
            Some(record) => (self.lookup)(record, parameters).into(),
            None => ComputationResult::error(format!("patient {patient} is not in the store")),
        }
    }
}

/// Every reference unit, reading from `store`.
pub fn reference_units(store: &Arc<PatientStore>) -> Vec<Arc<dyn ComputationUnit>> {
    let unit = |name: &'static str, lookup: LookupFn| StoreUnit::new(name, Arc::clone(store), lookup);
    let units = vec![
        unit(names::PATIENT_ID, patient_id),
        unit(names::PREFERRED_NAME, preferred_name),
        unit(names::UPN, |r, _| Ok(r.upn.clone().map(Payload::Text))),
        unit(names::ENROLLMENT_DATE, enrollment_date),
        unit(names::BIRTHDATE, |r, _| Ok(r.birthdate.map(Payload::Date))),
        unit(names::BIRTHDATE_ESTIMATED, |r, _| {
            Ok(r.birthdate.map(|_| Payload::Bool(r.birthdate_estimated)))
        }),
        unit(names::AGE_AT_ART_INITIATION, age_at_art_initiation),
        unit(names::GENDER, |r, _| Ok(r.gender.clone().map(Payload::Text))),
        unit(names::IS_TRANSFER_IN, |r, _| {
            Ok(r.transfer_in_date.map(|_| Payload::Bool(true)))
        }),
        unit(names::TRANSFER_IN_DATE, |r, _| Ok(r.transfer_in_date.map(Payload::Date))),
        unit(names::IS_TRANSFER_OUT, |r, _| {
            Ok(r.transfer_out_date.map(|_| Payload::Bool(true)))
        }),
        unit(names::TRANSFER_OUT_DATE, |r, _| Ok(r.transfer_out_date.map(Payload::Date))),
        unit(names::ART_START_DATE, |r, _| Ok(r.art_start_date.map(Payload::Date))),
        unit(names::MEDICALLY_ELIGIBLE, medically_eligible),
        unit(names::INITIAL_REGIMEN, |r, _| {
            Ok(r.initial_regimen().map(|reg| Payload::Coded(CodedValue::new(&reg.code))))
        }),
        unit(names::CURRENT_REGIMEN, |r, _| {
            Ok(r.current_regimen().map(|reg| Payload::Coded(CodedValue::new(&reg.code))))
        }),
        unit(names::LAST_CD4_COUNT, |r, _| latest_value(&r.cd4_counts, "CD4 count")),
        unit(names::LAST_CD4_COUNT_DATE, |r, _| Ok(latest_date(&r.cd4_counts))),
        unit(names::LAST_CD4_PERCENT, |r, _| latest_value(&r.cd4_percents, "CD4 percent")),
        unit(names::LAST_CD4_PERCENT_DATE, |r, _| Ok(latest_date(&r.cd4_percents))),
        unit(names::LAST_VIRAL_LOAD, |r, _| latest_value(&r.viral_loads, "viral load")),
        unit(names::LAST_VIRAL_LOAD_DATE, |r, _| Ok(latest_date(&r.viral_loads))),
        unit(names::LAST_VISIT_DATE, |r, _| {
            Ok(r.last_visit(None).map(|v| Payload::Date(v.date)))
        }),
        unit(names::NEXT_APPOINTMENT_DATE, |r, _| {
            Ok(r.last_visit(None).and_then(|v| v.next_appointment).map(Payload::Date))
        }),
        unit(names::DEATH_DATE, |r, _| Ok(r.death_date.map(Payload::Date))),
        unit(names::OUTCOME, art_outcome)
            .requires(UnitParameter::new("months", ParameterType::Integer))
            .requires(UnitParameter::date("onDate")),
    ];
    units
        .into_iter()
        .map(|unit| Arc::new(unit) as Arc<dyn ComputationUnit>)
        .collect()
}

fn patient_id(
    record: &PatientRecord,
    _parameters: &ParameterValues,
) -> Result<Option<Payload>, ComputationError> {
    let id = i64::try_from(record.id.get())
        .map_err(|_| ComputationError::new(format!("patient id {} is out of range", record.id)))?;
    Ok(Some(Payload::Integer(id)))
}

fn preferred_name(
    record: &PatientRecord,
    _parameters: &ParameterValues,
) -> Result<Option<Payload>, ComputationError> {
    let mut fields = vec![("familyName", Payload::text(&record.family_name))];
    if let Some(given) = &record.given_name {
        fields.push(("givenName", Payload::text(given)));
    }
    Ok(Some(Payload::record(fields)))
}

/// HIV care enrollment on or before `onDate`, when bound.
fn enrollment_date(
    record: &PatientRecord,
    parameters: &ParameterValues,
) -> Result<Option<Payload>, ComputationError> {
    let on = parameters.date("onDate");
    Ok(record
        .hiv_enrollment_date
        .filter(|enrolled| on.is_none_or(|on| *enrolled <= on))
        .map(Payload::Date))
}

fn age_at_art_initiation(
    record: &PatientRecord,
    _parameters: &ParameterValues,
) -> Result<Option<Payload>, ComputationError> {
    let (Some(birthdate), Some(started)) = (record.birthdate, record.art_start_date) else {
        return Ok(None);
    };
    let years = started.years_since(birthdate).ok_or_else(|| {
        ComputationError::new(format!("ART start {started} precedes birthdate {birthdate}"))
    })?;
    Ok(Some(Payload::Integer(i64::from(years))))
}

fn medically_eligible(
    record: &PatientRecord,
    _parameters: &ParameterValues,
) -> Result<Option<Payload>, ComputationError> {
    Ok(record.medically_eligible.as_ref().map(|eligibility| {
        Payload::record([
            ("date", Payload::Date(eligibility.date)),
            ("reason", Payload::Coded(CodedValue::new(&eligibility.reason))),
        ])
    }))
}

fn latest_value(
    observations: &[Observation],
    concept: &str,
) -> Result<Option<Payload>, ComputationError> {
    let Some(observation) = latest(observations) else {
        return Ok(None);
    };
    if !observation.value.is_finite() || observation.value < 0.0 {
        return Err(ComputationError::new(format!(
            "invalid {concept} value {} on {}",
            observation.value, observation.date
        )));
    }
    Ok(Some(Payload::Decimal(observation.value)))
}

fn latest_date(observations: &[Observation]) -> Option<Payload> {
    latest(observations).map(|o| Payload::Date(o.date))
}

/// Status `months` after ART start, if that point is on or before `onDate`.
///
/// Death and transfer out take precedence; otherwise a patient whose last
/// expected visit is more than [`LTFU_GRACE_DAYS`] behind the window end is
/// lost to follow-up.
fn art_outcome(
    record: &PatientRecord,
    parameters: &ParameterValues,
) -> Result<Option<Payload>, ComputationError> {
    let months = parameters
        .integer("months")
        .ok_or_else(|| ComputationError::new("months is not bound"))?;
    let on = parameters
        .date("onDate")
        .ok_or_else(|| ComputationError::new("onDate is not bound"))?;
    let months = u32::try_from(months)
        .ok()
        .filter(|m| *m > 0)
        .ok_or_else(|| ComputationError::new(format!("invalid outcome window: {months} months")))?;

    let Some(started) = record.art_start_date else {
        return Ok(None);
    };
    let Some(window_end) = started.checked_add_months(Months::new(months)) else {
        return Err(ComputationError::new(format!(
            "outcome window overflows from {started}"
        )));
    };
    if window_end > on {
        return Ok(None);
    }
    Ok(Some(Payload::Coded(CodedValue::new(outcome_at(record, window_end)))))
}

fn outcome_at(record: &PatientRecord, date: NaiveDate) -> &'static str {
    if record.death_date.is_some_and(|d| d <= date) {
        return outcome::DEAD;
    }
    if record.transfer_out_date.is_some_and(|d| d <= date) {
        return outcome::TRANSFERRED_OUT;
    }
    match record.last_visit(Some(date)) {
        Some(visit) => {
            let expected = visit.next_appointment.unwrap_or(visit.date);
            if (date - expected).num_days() > LTFU_GRACE_DAYS {
                outcome::LOST_TO_FOLLOW_UP
            } else {
                outcome::ALIVE
            }
        }
        None => outcome::LOST_TO_FOLLOW_UP,
    }
}
