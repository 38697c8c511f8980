//! Computation unit trait and built-in units.
//!
//! A computation unit is an independent, per-patient calculation. The
//! engine treats every unit identically: it hands over a patient id and the
//! parameter set bound for the column, and receives a [`ComputationResult`].
//!
//! # Implementing a Unit
//!
//! ```ignore
//! struct IsTransferIn {
//!     store: Arc<PatientStore>,
//! }
//!
//! impl ComputationUnit for IsTransferIn {
//!     fn name(&self) -> &str {
//!         "isTransferIn"
//!     }
//!
//!     fn evaluate(&self, patient: PatientId, _parameters: &ParameterValues) -> ComputationResult {
//!         // "no data" is Absent, never an error
//!         ComputationResult::Absent
//!     }
//! }
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use cohort_model::{ComputationResult, ParameterValues, PatientId, UnitParameter};

/// A pluggable per-patient calculation.
///
/// Units must not keep state between invocations: the assembler calls
/// them concurrently from several worker threads.
pub trait ComputationUnit: Send + Sync {
    /// Stable name used for registry lookup and logging.
    fn name(&self) -> &str;

    /// Parameters the unit cannot run without.
    ///
    /// A column may declare further parameters for its unit instance; the
    /// union of both is what the engine binds and supplies.
    fn required_parameters(&self) -> Vec<UnitParameter> {
        Vec::new()
    }

    /// Evaluates the unit for one patient.
    ///
    /// Missing data is reported as [`ComputationResult::Absent`]; malformed
    /// input or internal failures as [`ComputationResult::Error`].
    fn evaluate(&self, patient: PatientId, parameters: &ParameterValues) -> ComputationResult;
}

/// Stand-in for computations that have not been built yet.
///
/// Always returns `Absent`, so columns bound to it keep the table
/// rectangular without failing the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderUnit;

/// Registry name of [`PlaceholderUnit`].
pub const PLACEHOLDER_UNIT: &str = "notImplemented";

impl ComputationUnit for PlaceholderUnit {
    fn name(&self) -> &str {
        PLACEHOLDER_UNIT
    }

    fn evaluate(&self, _patient: PatientId, _parameters: &ParameterValues) -> ComputationResult {
        ComputationResult::Absent
    }
}

type UnitFn = dyn Fn(PatientId, &ParameterValues) -> ComputationResult + Send + Sync;

/// Adapts a closure to the [`ComputationUnit`] trait.
pub struct FunctionUnit {
    name: String,
    parameters: Vec<UnitParameter>,
    evaluate_fn: Box<UnitFn>,
}

impl FunctionUnit {
    pub fn new<F>(name: impl Into<String>, evaluate_fn: F) -> Self
    where
        F: Fn(PatientId, &ParameterValues) -> ComputationResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            evaluate_fn: Box::new(evaluate_fn),
        }
    }

    #[must_use]
    pub fn requires(mut self, parameter: UnitParameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

impl ComputationUnit for FunctionUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_parameters(&self) -> Vec<UnitParameter> {
        self.parameters.clone()
    }

    fn evaluate(&self, patient: PatientId, parameters: &ParameterValues) -> ComputationResult {
        (self.evaluate_fn)(patient, parameters)
    }
}

/// Invokes a unit, turning a panic into an `Error` result.
pub(crate) fn invoke_unit(
    unit: &dyn ComputationUnit,
    patient: PatientId,
    parameters: &ParameterValues,
) -> ComputationResult {
    match panic::catch_unwind(AssertUnwindSafe(|| unit.evaluate(patient, parameters))) {
        Ok(result) => result,
        Err(cause) => ComputationResult::error(format!(
            "unit '{}' panicked: {}",
            unit.name(),
            panic_detail(cause.as_ref())
        )),
    }
}

/// Message carried by a caught panic payload.
pub(crate) fn panic_detail(cause: &(dyn Any + Send)) -> String {
    cause
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| cause.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_always_absent() {
        let unit = PlaceholderUnit;
        for id in 1..4 {
            assert!(unit
                .evaluate(PatientId::new(id), &ParameterValues::new())
                .is_absent());
        }
    }

    #[test]
    fn panics_become_error_results() {
        let unit = FunctionUnit::new("boom", |_, _| panic!("no visits table"));
        let result = invoke_unit(&unit, PatientId::new(1), &ParameterValues::new());
        match result {
            ComputationResult::Error(error) => {
                assert!(error.message.contains("boom"));
                assert!(error.message.contains("no visits table"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }
}
