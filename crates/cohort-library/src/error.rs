use std::path::PathBuf;

use cohort_model::PatientId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse patient records: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate patient record: {patient}")]
    DuplicatePatient { patient: PatientId },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(source: serde_json::Error) -> Self {
        Self::Json { source }
    }
}
