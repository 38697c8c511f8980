//! Errors that fail a report run.

use cohort_model::{ComputationError, ConfigurationError};
use thiserror::Error;

use crate::assembler::RunState;

/// Why a run ended in the `Failed` state.
///
/// Per-cell computation errors never appear here; they are recorded in the
/// assembled output instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("cohort filter '{filter}' failed: {source}")]
    Cohort {
        filter: String,
        #[source]
        source: ComputationError,
    },
    #[error("report run is {found:?}, expected {expected:?}")]
    InvalidState { expected: RunState, found: RunState },
}

pub type Result<T> = std::result::Result<T, RunError>;
