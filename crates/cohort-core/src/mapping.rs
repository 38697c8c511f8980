//! Parameter mapping expressions.
//!
//! A mapping binds report parameters to the parameters of a unit or
//! filter. Expressions use the form `target=${source}` separated by
//! commas, e.g. `"startDate=${startDate},endDate=${endDate}"` or
//! `"onDate=${endDate}"`. An empty expression maps nothing.

use std::fmt;

use cohort_model::ConfigurationError;

/// One `target=${source}` binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    /// Report parameter name.
    pub source: String,
    /// Unit or filter parameter name.
    pub target: String,
}

/// Ordered report parameter → unit parameter bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMapping {
    entries: Vec<MappingEntry>,
}

impl ParameterMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a mapping expression.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidMapping`] for malformed entries
    /// or when the same target is bound twice.
    pub fn parse(expression: &str) -> Result<Self, ConfigurationError> {
        let mut mapping = Self::new();
        for part in expression.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let invalid = || ConfigurationError::InvalidMapping(part.to_string());
            let (target, source) = part.split_once('=').ok_or_else(invalid)?;
            let source = source
                .trim()
                .strip_prefix("${")
                .and_then(|s| s.strip_suffix('}'))
                .ok_or_else(invalid)?;
            mapping = mapping.map(source.trim(), target.trim())?;
        }
        Ok(mapping)
    }

    /// Adds a binding from report parameter `source` to `target`.
    pub fn map(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let source = source.into();
        let target = target.into();
        if source.is_empty() || target.is_empty() {
            return Err(ConfigurationError::InvalidMapping(format!(
                "{target}=${{{source}}}"
            )));
        }
        if self.target_for(&target).is_some() {
            return Err(ConfigurationError::InvalidMapping(format!(
                "'{target}' is mapped more than once"
            )));
        }
        self.entries.push(MappingEntry { source, target });
        Ok(self)
    }

    /// Maps each named parameter onto a parameter of the same name.
    pub fn identity<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigurationError> {
        names
            .into_iter()
            .try_fold(Self::new(), |mapping, name| mapping.map(name, name))
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Report parameter bound to `target`, if any.
    pub fn target_for(&self, target: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.target == target)
            .map(|entry| entry.source.as_str())
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.source.as_str())
    }
}

impl fmt::Display for ParameterMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|entry| format!("{}=${{{}}}", entry.target, entry.source))
            .collect();
        f.write_str(&parts.join(","))
    }
}
