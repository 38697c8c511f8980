//! Cohort filters and their resolution against report parameters.
//!
//! The cohort defines the row axis of a report run. It is resolved exactly
//! once per run, before any column is evaluated.

use std::collections::BTreeSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use cohort_model::{
    ComputationError, ConfigurationError, ParameterValues, PatientId, ReportParameter,
    UnitParameter,
};

use crate::mapping::ParameterMapping;

/// A reusable, parameterized predicate over the patient population.
pub trait CohortFilter: Send + Sync {
    fn name(&self) -> &str;

    /// Parameters the filter accepts. Parameters with a default may be
    /// left unmapped.
    fn parameters(&self) -> Vec<UnitParameter>;

    /// Evaluates the filter against the full candidate population.
    ///
    /// The returned order becomes the row order of the report.
    fn evaluate(&self, parameters: &ParameterValues) -> Result<Vec<PatientId>, ComputationError>;
}

/// The cohort binding of a report: a filter plus its parameter mapping.
#[derive(Clone)]
pub struct CohortSpec {
    filter: Arc<dyn CohortFilter>,
    mapping: ParameterMapping,
}

impl CohortSpec {
    pub fn new(filter: Arc<dyn CohortFilter>, mapping: ParameterMapping) -> Self {
        Self { filter, mapping }
    }

    /// Builds a spec from a mapping expression such as
    /// `"startDate=${startDate},endDate=${endDate}"`.
    pub fn mapped(filter: Arc<dyn CohortFilter>, expression: &str) -> Result<Self, ConfigurationError> {
        Ok(Self::new(filter, ParameterMapping::parse(expression)?))
    }

    pub fn filter(&self) -> &dyn CohortFilter {
        self.filter.as_ref()
    }

    pub fn mapping(&self) -> &ParameterMapping {
        &self.mapping
    }

    fn context(&self) -> String {
        format!("cohort filter '{}'", self.filter.name())
    }

    /// Checks that every mapping target is a filter parameter of the same
    /// type as the report parameter mapped onto it.
    pub(crate) fn validate_targets(
        &self,
        declared: &[ReportParameter],
    ) -> Result<(), ConfigurationError> {
        let accepted = self.filter.parameters();
        for entry in self.mapping.entries() {
            let Some(target) = accepted.iter().find(|p| p.name == entry.target) else {
                return Err(ConfigurationError::UnknownTargetParameter {
                    context: self.context(),
                    parameter: entry.target.clone(),
                });
            };
            if let Some(source) = declared.iter().find(|p| p.name == entry.source)
                && source.parameter_type != target.parameter_type
            {
                return Err(ConfigurationError::TypeMismatch {
                    parameter: target.name.clone(),
                    expected: target.parameter_type,
                    found: source.parameter_type,
                });
            }
        }
        Ok(())
    }

    /// Assigns every filter parameter from its mapped report parameter or
    /// its default.
    ///
    /// # Errors
    ///
    /// Fails when a mapped report value is missing or has the wrong type,
    /// or when an unmapped parameter has no default.
    pub fn resolve_parameters(
        &self,
        report_values: &ParameterValues,
    ) -> Result<ParameterValues, ConfigurationError> {
        let mut resolved = ParameterValues::new();
        for parameter in self.filter.parameters() {
            let value = match self.mapping.target_for(&parameter.name) {
                Some(source) => {
                    let value = report_values.get(source).ok_or_else(|| {
                        ConfigurationError::MissingParameter {
                            parameter: source.to_string(),
                        }
                    })?;
                    if value.parameter_type() != parameter.parameter_type {
                        return Err(ConfigurationError::TypeMismatch {
                            parameter: parameter.name.clone(),
                            expected: parameter.parameter_type,
                            found: value.parameter_type(),
                        });
                    }
                    value.clone()
                }
                None => parameter.default.clone().ok_or_else(|| {
                    ConfigurationError::UnboundParameter {
                        context: self.context(),
                        parameter: parameter.name.clone(),
                    }
                })?,
            };
            resolved.insert(parameter.name, value);
        }
        Ok(resolved)
    }

    /// Evaluates the filter once and removes duplicate patients, keeping
    /// the first occurrence.
    pub fn evaluate(&self, parameters: &ParameterValues) -> Result<Vec<PatientId>, ComputationError> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.filter.evaluate(parameters)))
            .map_err(|_| ComputationError::new(format!("{} panicked", self.context())))?;
        let patients = outcome?;
        let mut seen = BTreeSet::new();
        Ok(patients.into_iter().filter(|id| seen.insert(*id)).collect())
    }
}

impl fmt::Debug for CohortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CohortSpec")
            .field("filter", &self.filter.name())
            .field("mapping", &self.mapping.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use cohort_model::{ParameterType, ParameterValue};

    use super::*;

    struct Fixed {
        ids: Vec<u64>,
    }

    impl CohortFilter for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn parameters(&self) -> Vec<UnitParameter> {
            vec![
                UnitParameter::date("startDate"),
                UnitParameter::date("endDate"),
                UnitParameter::new("program", ParameterType::String)
                    .with_default(ParameterValue::from("HIV")),
            ]
        }

        fn evaluate(&self, _parameters: &ParameterValues) -> Result<Vec<PatientId>, ComputationError> {
            Ok(self.ids.iter().copied().map(PatientId::new).collect())
        }
    }

    fn report_values() -> ParameterValues {
        ParameterValues::new()
            .with("startDate", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .with("endDate", NaiveDate::from_ymd_opt(2020, 12, 31).unwrap())
    }

    #[test]
    fn resolves_mapped_and_default_parameters() {
        let spec = CohortSpec::mapped(
            Arc::new(Fixed { ids: vec![] }),
            "startDate=${startDate},endDate=${endDate}",
        )
        .unwrap();
        let resolved = spec.resolve_parameters(&report_values()).unwrap();
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved.get("program"), Some(&ParameterValue::from("HIV")));
    }

    #[test]
    fn unmapped_parameter_without_default_fails() {
        let spec = CohortSpec::mapped(Arc::new(Fixed { ids: vec![] }), "startDate=${startDate}").unwrap();
        let err = spec.resolve_parameters(&report_values()).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::UnboundParameter { ref parameter, .. } if parameter == "endDate"
        ));
    }

    #[test]
    fn evaluation_deduplicates_in_order() {
        let spec = CohortSpec::new(
            Arc::new(Fixed {
                ids: vec![5, 3, 5, 9, 3],
            }),
            ParameterMapping::new(),
        );
        let ids: Vec<u64> = spec
            .evaluate(&ParameterValues::new())
            .unwrap()
            .into_iter()
            .map(PatientId::get)
            .collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }
}
