//! Report-column composition engine.
//!
//! Selects a cohort through a parameterized filter, binds report
//! parameters into each column's computation unit, evaluates every
//! (patient, column) pair, converts the raw results into display values
//! and assembles an ordered, named table.

pub mod assembler;
pub mod binding;
pub mod cohort;
pub mod column;
pub mod converter;
pub mod definition;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod unit;

pub use assembler::{CancellationToken, ReportAssembler, ReportRun, RunState};
pub use binding::{bind_column, bind_report_parameters};
pub use cohort::{CohortFilter, CohortSpec};
pub use column::ColumnSpec;
pub use converter::{
    CodedValueConverter, DateConverter, FieldConverter, FormatContext, PassThroughConverter,
    Placeholders, ResultConverter, TemplateConverter, render_payload,
};
pub use definition::{ReportDefinition, ReportDescriptor};
pub use error::{Result, RunError};
pub use mapping::{MappingEntry, ParameterMapping};
pub use registry::{Registry, RegistryBuilder};
pub use unit::{ComputationUnit, FunctionUnit, PLACEHOLDER_UNIT, PlaceholderUnit};
