//! Registry of computation units and cohort filters.
//!
//! The registry is process-wide, read-only configuration: it is built once
//! at startup and passed explicitly to whoever defines or runs reports.
//! Lookups are by stable name.
//!
//! # Example
//!
//! ```ignore
//! let registry = Registry::builder()
//!     .register_unit(Arc::new(IsTransferIn::new(store.clone())))
//!     .register_filter(Arc::new(ArtCohortFilter::new(store)))
//!     .build();
//! let unit = registry.unit("isTransferIn")?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use cohort_model::ConfigurationError;

use crate::cohort::CohortFilter;
use crate::unit::{ComputationUnit, PlaceholderUnit};

/// Immutable lookup of units and filters by name.
#[derive(Clone, Default)]
pub struct Registry {
    units: BTreeMap<String, Arc<dyn ComputationUnit>>,
    filters: BTreeMap<String, Arc<dyn CohortFilter>>,
}

impl Registry {
    /// Starts a registry that already contains the placeholder unit.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default().register_unit(Arc::new(PlaceholderUnit))
    }

    /// Looks up a unit by name.
    pub fn unit(&self, name: &str) -> Result<Arc<dyn ComputationUnit>, ConfigurationError> {
        self.units
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownUnit(name.to_string()))
    }

    /// Looks up a cohort filter by name.
    pub fn filter(&self, name: &str) -> Result<Arc<dyn CohortFilter>, ConfigurationError> {
        self.filters
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFilter(name.to_string()))
    }

    pub fn unit_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.units.keys().map(String::as_str)
    }

    pub fn filter_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.filters.keys().map(String::as_str)
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Registers a unit under its name, replacing any previous one.
    #[must_use]
    pub fn register_unit(mut self, unit: Arc<dyn ComputationUnit>) -> Self {
        self.registry.units.insert(unit.name().to_string(), unit);
        self
    }

    /// Registers a filter under its name, replacing any previous one.
    #[must_use]
    pub fn register_filter(mut self, filter: Arc<dyn CohortFilter>) -> Self {
        self.registry.filters.insert(filter.name().to_string(), filter);
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}
