pub mod error;
pub mod ids;
pub mod options;
pub mod parameter;
pub mod result;
pub mod table;

pub use error::{ComputationError, ConfigurationError, Result};
pub use ids::{ColumnName, PatientId};
pub use options::{DEFAULT_DATE_FORMAT, EngineOptions};
pub use parameter::{
    PARAMETER_DATE_FORMAT, ParameterType, ParameterValue, ParameterValues, ReportParameter,
    UnitParameter,
};
pub use result::{CodedValue, ComputationResult, Payload};
pub use table::{Cell, CellError, CellStatus, OutputTable, ReportOutput, Row, RunStatus};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_name_rejects_blank() {
        assert!(ColumnName::new("  ").is_err());
        assert_eq!(ColumnName::new(" TI ").unwrap().as_str(), "TI");
    }

    #[test]
    fn output_serializes() {
        let mut table = OutputTable::new("art", vec![ColumnName::new("TI").unwrap()]);
        table.push_row(Row {
            patient: PatientId::new(7),
            cells: vec![Cell::new("Yes", CellStatus::Present)],
        });
        let output = ReportOutput {
            table,
            status: RunStatus::Assembled,
            errors: vec![],
        };
        let json = serde_json::to_string(&output).expect("serialize output");
        let round: ReportOutput = serde_json::from_str(&json).expect("deserialize output");
        assert_eq!(round, output);
    }
}
