//! Reference units, the ART cohort filter and the ART cohort analysis
//! report, all reading from a JSON-loaded [`PatientStore`].

pub mod error;
pub mod filter;
pub mod reports;
pub mod store;
pub mod units;

use std::sync::Arc;

use cohort_core::Registry;

pub use error::StoreError;
pub use filter::{ART_COHORT_FILTER, ArtCohortFilter};
pub use reports::{ArtCohortAnalysis, find_report, reports};
pub use store::{Eligibility, Observation, PatientRecord, PatientStore, RegimenChange, Visit};
pub use units::{LTFU_GRACE_DAYS, StoreUnit, reference_units};

/// A registry holding every reference unit and the ART cohort filter.
pub fn default_registry(store: Arc<PatientStore>) -> Registry {
    let builder = reference_units(&store)
        .into_iter()
        .fold(Registry::builder(), |builder, unit| builder.register_unit(unit));
    builder
        .register_filter(Arc::new(ArtCohortFilter::new(store)))
        .build()
}
