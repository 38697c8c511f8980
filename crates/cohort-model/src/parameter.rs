//! Report parameters and the typed values bound to them.
//!
//! A report declares its parameters once ([`ReportParameter`]); callers
//! supply raw values at run time which are parsed and checked against the
//! declared [`ParameterType`]. The same [`ParameterValues`] container is
//! used for run-time report values, static unit configuration, bound unit
//! parameters and cohort filter parameters.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ConfigurationError;

/// Date format accepted for `Date` parameters supplied as text.
pub const PARAMETER_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    Date,
    Integer,
    String,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Date => "date",
            Self::Integer => "integer",
            Self::String => "string",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ParameterValue {
    Date(NaiveDate),
    Integer(i64),
    String(String),
}

impl ParameterValue {
    /// Parses caller-supplied text as a value of the given type.
    pub fn parse(
        name: &str,
        parameter_type: ParameterType,
        raw: &str,
    ) -> Result<Self, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidValue {
            parameter: name.to_string(),
            value: raw.to_string(),
            expected: parameter_type,
        };
        let trimmed = raw.trim();
        match parameter_type {
            ParameterType::Date => NaiveDate::parse_from_str(trimmed, PARAMETER_DATE_FORMAT)
                .map(Self::Date)
                .map_err(|_| invalid()),
            ParameterType::Integer => trimmed
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|_| invalid()),
            ParameterType::String => Ok(Self::String(raw.to_string())),
        }
    }

    pub fn parameter_type(&self) -> ParameterType {
        match self {
            Self::Date(_) => ParameterType::Date,
            Self::Integer(_) => ParameterType::Integer,
            Self::String(_) => ParameterType::String,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format(PARAMETER_DATE_FORMAT)),
            Self::Integer(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl From<NaiveDate> for ParameterValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// A parameter declared at report level and supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportParameter {
    pub name: String,
    pub label: String,
    pub parameter_type: ParameterType,
}

impl ReportParameter {
    pub fn new(name: impl Into<String>, label: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            parameter_type,
        }
    }

    pub fn date(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, ParameterType::Date)
    }
}

/// A parameter accepted by a computation unit or a cohort filter.
///
/// An unbound parameter falls back to `default`; without one it is a
/// configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitParameter {
    pub name: String,
    pub parameter_type: ParameterType,
    pub default: Option<ParameterValue>,
}

impl UnitParameter {
    pub fn new(name: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            parameter_type,
            default: None,
        }
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Date)
    }

    #[must_use]
    pub fn with_default(mut self, value: ParameterValue) -> Self {
        self.default = Some(value);
        self
    }
}

/// Named, typed values ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterValues(BTreeMap<String, ParameterValue>);

impl ParameterValues {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a value, returning the one it replaced.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParameterValue>,
    ) -> Option<ParameterValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(name)
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        self.get(name).and_then(ParameterValue::as_date)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParameterValue::as_integer)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> + '_ {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Parses raw caller text against the declared parameters.
    ///
    /// Unknown names are ignored; absent declared parameters are reported by
    /// [`ParameterValues::check_declared`].
    pub fn parse_raw<'a>(
        declared: &[ReportParameter],
        raw: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ConfigurationError> {
        let mut values = Self::new();
        for (name, text) in raw {
            let Some(parameter) = declared.iter().find(|p| p.name == name) else {
                continue;
            };
            let value = ParameterValue::parse(name, parameter.parameter_type, text)?;
            values.insert(name, value);
        }
        Ok(values)
    }

    /// Verifies every declared parameter is present with the declared type.
    pub fn check_declared(&self, declared: &[ReportParameter]) -> Result<(), ConfigurationError> {
        for parameter in declared {
            let Some(value) = self.get(&parameter.name) else {
                return Err(ConfigurationError::MissingParameter {
                    parameter: parameter.name.clone(),
                });
            };
            if value.parameter_type() != parameter.parameter_type {
                return Err(ConfigurationError::TypeMismatch {
                    parameter: parameter.name.clone(),
                    expected: parameter.parameter_type,
                    found: value.parameter_type(),
                });
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<ParameterValue>> FromIterator<(K, V)> for ParameterValues {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut values = Self::new();
        for (name, value) in iter {
            values.insert(name, value);
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_typed_values() {
        assert_eq!(
            ParameterValue::parse("endDate", ParameterType::Date, "2020-12-31").unwrap(),
            ParameterValue::Date(date(2020, 12, 31))
        );
        assert_eq!(
            ParameterValue::parse("months", ParameterType::Integer, " 12 ").unwrap(),
            ParameterValue::Integer(12)
        );
        let err = ParameterValue::parse("endDate", ParameterType::Date, "31/12/2020").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }

    #[test]
    fn check_declared_reports_missing_and_mismatched() {
        let declared = vec![
            ReportParameter::date("startDate", "Start Date"),
            ReportParameter::date("endDate", "End Date"),
        ];
        let values = ParameterValues::new().with("startDate", date(2020, 1, 1));
        assert_eq!(
            values.check_declared(&declared),
            Err(ConfigurationError::MissingParameter {
                parameter: "endDate".to_string()
            })
        );

        let values = values.with("endDate", 5_i64);
        assert!(matches!(
            values.check_declared(&declared),
            Err(ConfigurationError::TypeMismatch { .. })
        ));
    }
}
