use std::path::PathBuf;
use std::time::Duration;

use cohort_model::ReportOutput;

#[derive(Debug)]
pub struct RunResult {
    pub report: String,
    pub data: PathBuf,
    pub output: ReportOutput,
    pub elapsed: Duration,
}

impl RunResult {
    /// Non-zero only when the run stopped before every cell was evaluated.
    /// Cell errors are part of the report and leave the exit code at 0.
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.output.is_complete())
    }
}
