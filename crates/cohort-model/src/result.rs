//! Raw results returned by computation units.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ComputationError;

/// A coded clinical value (regimen code, eligibility reason, outcome).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedValue {
    pub code: String,
    pub label: Option<String>,
}

impl CodedValue {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// The typed value carried by a present result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Payload {
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    Date(NaiveDate),
    Coded(CodedValue),
    /// Named fields, e.g. `familyName`/`givenName` or `date`/`reason`.
    Record(BTreeMap<String, Payload>),
    List(Vec<Payload>),
}

impl Payload {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Payload)>,
    {
        Self::Record(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    /// Returns a named field of a record payload.
    pub fn field(&self, name: &str) -> Option<&Payload> {
        match self {
            Self::Record(fields) => fields.get(name),
            _ => None,
        }
    }
}

/// Outcome of evaluating one computation unit for one patient.
///
/// `Absent` is a legitimate "no applicable data" outcome and is distinct
/// from `Error`, which means the computation could not run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value")]
pub enum ComputationResult {
    Present(Payload),
    Absent,
    Error(ComputationError),
}

impl ComputationResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ComputationError::new(message))
    }

    /// Wraps an optional payload, mapping `None` to `Absent`.
    pub fn from_option(value: Option<Payload>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Present(payload) => Some(payload),
            _ => None,
        }
    }
}

impl From<Result<Option<Payload>, ComputationError>> for ComputationResult {
    fn from(value: Result<Option<Payload>, ComputationError>) -> Self {
        match value {
            Ok(payload) => Self::from_option(payload),
            Err(error) => Self::Error(error),
        }
    }
}
