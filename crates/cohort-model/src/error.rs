use thiserror::Error;

use crate::parameter::ParameterType;

/// Errors detected while defining a report or binding its parameters.
///
/// Every variant is fatal to a report run and is raised before any cohort
/// or computation work begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
    #[error("duplicate report parameter: {0}")]
    DuplicateParameter(String),
    #[error("{context} references undeclared report parameter '{parameter}'")]
    UndeclaredParameter { context: String, parameter: String },
    #[error("{context} does not accept parameter '{parameter}'")]
    UnknownTargetParameter { context: String, parameter: String },
    #[error("parameter '{parameter}' expects {expected}, found {found}")]
    TypeMismatch {
        parameter: String,
        expected: ParameterType,
        found: ParameterType,
    },
    #[error("missing required parameter '{parameter}'")]
    MissingParameter { parameter: String },
    #[error("{context} requires parameter '{parameter}' but nothing is bound to it")]
    UnboundParameter { context: String, parameter: String },
    #[error("column '{column}' configures '{parameter}' both statically and by mapping")]
    ConflictingConfig { column: String, parameter: String },
    #[error("invalid value '{value}' for parameter '{parameter}': expected {expected}")]
    InvalidValue {
        parameter: String,
        value: String,
        expected: ParameterType,
    },
    #[error("invalid parameter mapping '{0}'")]
    InvalidMapping(String),
    #[error("unknown computation unit: {0}")]
    UnknownUnit(String),
    #[error("unknown cohort filter: {0}")]
    UnknownFilter(String),
    #[error("invalid name: '{0}'")]
    InvalidName(String),
}

/// A computation unit (or cohort filter) could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("{message}")]
pub struct ComputationError {
    pub message: String,
}

impl ComputationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;
