//! Column definitions.

use std::fmt;
use std::sync::Arc;

use cohort_model::{ColumnName, ConfigurationError, ParameterValue, ParameterValues, UnitParameter};

use crate::converter::{PassThroughConverter, ResultConverter};
use crate::mapping::ParameterMapping;
use crate::unit::ComputationUnit;

/// Binds a display name to a unit instance, its static configuration, its
/// parameter mapping and a converter.
///
/// Built once while a report is defined and never mutated afterwards.
#[derive(Clone)]
pub struct ColumnSpec {
    name: ColumnName,
    unit: Arc<dyn ComputationUnit>,
    parameters: Vec<UnitParameter>,
    config: ParameterValues,
    mapping: ParameterMapping,
    converter: Arc<dyn ResultConverter>,
}

impl ColumnSpec {
    /// Creates a column with no mapping, no config and a pass-through
    /// converter.
    pub fn new(
        name: impl Into<String>,
        unit: Arc<dyn ComputationUnit>,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            name: ColumnName::new(name)?,
            unit,
            parameters: Vec::new(),
            config: ParameterValues::new(),
            mapping: ParameterMapping::new(),
            converter: Arc::new(PassThroughConverter::new()),
        })
    }

    /// Declares a parameter for this unit instance.
    #[must_use]
    pub fn with_parameter(mut self, parameter: UnitParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Adds static, non-report-derived configuration (e.g. `months`).
    #[must_use]
    pub fn with_config(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.config.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_mapping(mut self, mapping: ParameterMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Parses and sets a mapping expression such as `"onDate=${endDate}"`.
    pub fn mapped(self, expression: &str) -> Result<Self, ConfigurationError> {
        let mapping = ParameterMapping::parse(expression)?;
        Ok(self.with_mapping(mapping))
    }

    #[must_use]
    pub fn with_converter(mut self, converter: Arc<dyn ResultConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn name(&self) -> &ColumnName {
        &self.name
    }

    pub fn unit(&self) -> &dyn ComputationUnit {
        self.unit.as_ref()
    }

    pub fn config(&self) -> &ParameterValues {
        &self.config
    }

    pub fn mapping(&self) -> &ParameterMapping {
        &self.mapping
    }

    pub fn converter(&self) -> &dyn ResultConverter {
        self.converter.as_ref()
    }

    /// Every parameter the unit instance accepts: the unit's own required
    /// parameters followed by those declared on the column.
    pub fn unit_parameters(&self) -> Vec<UnitParameter> {
        let mut parameters = self.unit.required_parameters();
        for parameter in &self.parameters {
            if !parameters.iter().any(|p| p.name == parameter.name) {
                parameters.push(parameter.clone());
            }
        }
        parameters
    }
}

impl fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("name", &self.name)
            .field("unit", &self.unit.name())
            .field("config", &self.config)
            .field("mapping", &self.mapping.to_string())
            .field("converter", &self.converter.name())
            .finish()
    }
}
