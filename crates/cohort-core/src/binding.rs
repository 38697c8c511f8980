//! Run-time parameter binding.
//!
//! Binding is pure: it reads the caller's report values and a column spec
//! and produces the exact parameter set handed to the column's unit. It
//! never mutates the column spec.

use cohort_model::{ConfigurationError, ParameterValues, ReportParameter};

use crate::column::ColumnSpec;

/// Validates caller-supplied report values against the declared
/// parameters, returning only the declared ones.
///
/// # Errors
///
/// [`ConfigurationError::MissingParameter`] or
/// [`ConfigurationError::TypeMismatch`].
pub fn bind_report_parameters(
    declared: &[ReportParameter],
    values: &ParameterValues,
) -> Result<ParameterValues, ConfigurationError> {
    values.check_declared(declared)?;
    Ok(declared
        .iter()
        .filter_map(|p| values.get(&p.name).map(|v| (p.name.clone(), v.clone())))
        .collect())
}

/// Produces the parameter set for one column's unit.
///
/// Starts from the column's static config and adds each parameter the unit
/// instance declares, taken from its mapped report parameter or else its
/// default. Report parameters the unit did not declare are never passed on.
///
/// # Errors
///
/// - a declared unit parameter that is not configured, not mapped and has
///   no default;
/// - a mapped report parameter missing from `report_values`;
/// - a value whose type differs from the declared unit parameter type.
pub fn bind_column(
    column: &ColumnSpec,
    report_values: &ParameterValues,
) -> Result<ParameterValues, ConfigurationError> {
    let mut bound = column.config().clone();
    for parameter in column.unit_parameters() {
        let value = if let Some(value) = column.config().get(&parameter.name) {
            value.clone()
        } else if let Some(source) = column.mapping().target_for(&parameter.name) {
            report_values
                .get(source)
                .cloned()
                .ok_or_else(|| ConfigurationError::MissingParameter {
                    parameter: source.to_string(),
                })?
        } else if let Some(default) = parameter.default.clone() {
            default
        } else {
            return Err(ConfigurationError::UnboundParameter {
                context: format!("column '{}'", column.name()),
                parameter: parameter.name,
            });
        };
        if value.parameter_type() != parameter.parameter_type {
            return Err(ConfigurationError::TypeMismatch {
                parameter: parameter.name,
                expected: parameter.parameter_type,
                found: value.parameter_type(),
            });
        }
        bound.insert(parameter.name, value);
    }
    Ok(bound)
}
