//! Report descriptors and validated report definitions.
//!
//! A [`ReportDescriptor`] declares a report: its parameters, its cohort and
//! its ordered columns. [`ReportDefinition::from_descriptor`] turns the
//! declaration into a validated, immutable definition. Every structural
//! problem is reported here, at configuration time, rather than during a
//! run.

use std::collections::BTreeSet;
use std::fmt;

use cohort_model::{ColumnName, ConfigurationError, ReportParameter};

use crate::cohort::CohortSpec;
use crate::column::ColumnSpec;
use crate::registry::Registry;

/// Declares a report.
///
/// Implementations must be deterministic and free of side effects:
/// calling them twice yields structurally identical specs.
pub trait ReportDescriptor: Send + Sync {
    /// Stable report name (e.g. `"art-cohort-analysis"`).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        "Cohort report"
    }

    fn parameters(&self) -> Vec<ReportParameter>;

    fn cohort(&self, registry: &Registry) -> Result<CohortSpec, ConfigurationError>;

    fn columns(&self, registry: &Registry) -> Result<Vec<ColumnSpec>, ConfigurationError>;
}

/// A validated report: parameters, cohort binding and ordered columns.
#[derive(Clone)]
pub struct ReportDefinition {
    name: String,
    parameters: Vec<ReportParameter>,
    cohort: CohortSpec,
    columns: Vec<ColumnSpec>,
}

impl ReportDefinition {
    /// Builds and validates a definition from a descriptor.
    pub fn from_descriptor(
        descriptor: &dyn ReportDescriptor,
        registry: &Registry,
    ) -> Result<Self, ConfigurationError> {
        Self::new(
            descriptor.name(),
            descriptor.parameters(),
            descriptor.cohort(registry)?,
            descriptor.columns(registry)?,
        )
    }

    /// Validates the parts of a report definition.
    ///
    /// # Errors
    ///
    /// - duplicate report parameter or column names;
    /// - a cohort or column mapping that references an undeclared report
    ///   parameter;
    /// - a mapping target the unit or filter does not accept;
    /// - a report parameter whose type differs from the unit parameter it
    ///   is mapped to;
    /// - a unit parameter both configured statically and mapped.
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<ReportParameter>,
        cohort: CohortSpec,
        columns: Vec<ColumnSpec>,
    ) -> Result<Self, ConfigurationError> {
        let mut names = BTreeSet::new();
        for parameter in &parameters {
            if !names.insert(parameter.name.as_str()) {
                return Err(ConfigurationError::DuplicateParameter(parameter.name.clone()));
            }
        }

        check_sources(&parameters, cohort.mapping().sources(), || {
            format!("cohort filter '{}'", cohort.filter().name())
        })?;
        cohort.validate_targets(&parameters)?;

        let mut column_names = BTreeSet::new();
        for column in &columns {
            if !column_names.insert(column.name().as_str()) {
                return Err(ConfigurationError::DuplicateColumn(column.name().to_string()));
            }
            validate_column(&parameters, column)?;
        }

        Ok(Self {
            name: name.into(),
            parameters,
            cohort,
            columns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[ReportParameter] {
        &self.parameters
    }

    pub fn cohort(&self) -> &CohortSpec {
        &self.cohort
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<ColumnName> {
        self.columns.iter().map(|c| c.name().clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name().as_str() == name)
    }
}

impl fmt::Debug for ReportDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportDefinition")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("cohort", &self.cohort)
            .field("columns", &self.columns)
            .finish()
    }
}

fn check_sources<'a, F>(
    declared: &[ReportParameter],
    sources: impl Iterator<Item = &'a str>,
    context: F,
) -> Result<(), ConfigurationError>
where
    F: Fn() -> String,
{
    for source in sources {
        if !declared.iter().any(|p| p.name == source) {
            return Err(ConfigurationError::UndeclaredParameter {
                context: context(),
                parameter: source.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_column(
    declared: &[ReportParameter],
    column: &ColumnSpec,
) -> Result<(), ConfigurationError> {
    let context = || format!("column '{}'", column.name());
    check_sources(declared, column.mapping().sources(), context)?;

    let accepted = column.unit_parameters();
    for entry in column.mapping().entries() {
        let Some(target) = accepted.iter().find(|p| p.name == entry.target) else {
            return Err(ConfigurationError::UnknownTargetParameter {
                context: context(),
                parameter: entry.target.clone(),
            });
        };
        if column.config().contains(&entry.target) {
            return Err(ConfigurationError::ConflictingConfig {
                column: column.name().to_string(),
                parameter: entry.target.clone(),
            });
        }
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
