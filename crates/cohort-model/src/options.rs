//! Configuration options for report runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default display pattern for dates rendered by converters.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

/// Options controlling how the assembler evaluates a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Worker threads used for (patient, column) evaluation.
    ///
    /// `None` sizes the pool to the available parallelism. A pool of one
    /// evaluates every cell on the calling thread.
    pub workers: Option<usize>,

    /// Stop scheduling new cells once this much time has elapsed.
    pub timeout: Option<Duration>,

    /// `chrono` pattern used by converters that render dates without a
    /// pattern of their own.
    pub date_format: String,

    /// Display value for `Absent` results.
    pub absent_placeholder: String,

    /// Display value for `Error` results.
    pub error_placeholder: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            workers: None,
            timeout: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            absent_placeholder: String::new(),
            error_placeholder: String::new(),
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a single-threaded run.
    pub fn sequential() -> Self {
        Self {
            workers: Some(1),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_date_format(mut self, pattern: impl Into<String>) -> Self {
        self.date_format = pattern.into();
        self
    }

    #[must_use]
    pub fn with_placeholders(mut self, absent: impl Into<String>, error: impl Into<String>) -> Self {
        self.absent_placeholder = absent.into();
        self.error_placeholder = error.into();
        self
    }

    /// Resolves the configured worker count against the machine.
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(std::num::NonZeroUsize::get)
                    .unwrap_or(1)
            })
            .max(1)
    }
}
