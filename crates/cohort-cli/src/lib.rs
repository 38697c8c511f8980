//! Library components of the cohort report CLI.

pub mod logging;
pub mod render;
