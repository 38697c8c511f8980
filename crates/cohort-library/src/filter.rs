//! The ART cohort filter.

use std::sync::Arc;

use cohort_core::CohortFilter;
use cohort_model::{
    ComputationError, ParameterType, ParameterValue, ParameterValues, PatientId, UnitParameter,
};
use tracing::debug;

use crate::store::PatientStore;

/// Registry name of [`ArtCohortFilter`].
pub const ART_COHORT_FILTER: &str = "artCohortBetweenDates";

/// How patients transferred in from another facility are treated.
pub const TRANSFER_INS_INCLUDE: &str = "include";
pub const TRANSFER_INS_EXCLUDE: &str = "exclude";

/// Patients who started ART between `startDate` and `endDate`, inclusive.
///
/// The optional `transferIns` parameter (`include` by default) drops
/// patients who were transferred in on or before `endDate` when set to
/// `exclude`. Patients are returned in ART start order, then by id.
pub struct ArtCohortFilter {
    store: Arc<PatientStore>,
}

impl ArtCohortFilter {
    pub fn new(store: Arc<PatientStore>) -> Self {
        Self { store }
    }
}

impl CohortFilter for ArtCohortFilter {
    fn name(&self) -> &str {
        ART_COHORT_FILTER
    }

    fn parameters(&self) -> Vec<UnitParameter> {
        vec![
            UnitParameter::date("startDate"),
            UnitParameter::date("endDate"),
            UnitParameter::new("transferIns", ParameterType::String)
                .with_default(ParameterValue::from(TRANSFER_INS_INCLUDE)),
        ]
    }

    fn evaluate(&self, parameters: &ParameterValues) -> Result<Vec<PatientId>, ComputationError> {
        let start = parameters
            .date("startDate")
            .ok_or_else(|| ComputationError::new("startDate is not bound"))?;
        let end = parameters
            .date("endDate")
            .ok_or_else(|| ComputationError::new("endDate is not bound"))?;
        if start > end {
            return Err(ComputationError::new(format!(
                "startDate {start} is after endDate {end}"
            )));
        }
        let exclude_transfer_ins = match parameters.get("transferIns").and_then(ParameterValue::as_str) {
            None | Some(TRANSFER_INS_INCLUDE) => false,
            Some(TRANSFER_INS_EXCLUDE) => true,
            Some(other) => {
                return Err(ComputationError::new(format!(
                    "unknown transferIns policy '{other}'"
                )));
            }
        };

        let mut selected: Vec<_> = self
            .store
            .patients()
            .filter_map(|record| {
                let started = record.art_start_date?;
                if started < start || started > end {
                    return None;
                }
                if exclude_transfer_ins && record.transfer_in_date.is_some_and(|d| d <= end) {
                    return None;
                }
                Some((started, record.id))
            })
            .collect();
        selected.sort_unstable();
        debug!(
            start = %start,
            end = %end,
            exclude_transfer_ins,
            patients = selected.len(),
            "art cohort evaluated"
        );
        Ok(selected.into_iter().map(|(_, id)| id).collect())
    }
}
