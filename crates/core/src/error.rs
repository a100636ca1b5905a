use crate::generation::GenerationError;
use crate::PatientId;
use ehrsim_types::{SummaryType, TextError, UnknownSummaryType};

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("summary content cannot be empty")]
    EmptyContent,
    #[error(transparent)]
    UnknownSummaryType(#[from] UnknownSummaryType),
    #[error("patient {0} not found")]
    PatientNotFound(PatientId),
    #[error("invalid patient record: {0}")]
    Record(#[from] fhir::FhirError),

    #[error("summary generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("concurrent save conflict for patient {patient_id} ({summary_type})")]
    ConcurrentSave {
        patient_id: PatientId,
        summary_type: SummaryType,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored row is invalid: {0}")]
    CorruptRow(String),

    #[error("failed to read configuration file: {0}")]
    ConfigRead(std::io::Error),
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<TextError> for SummaryError {
    fn from(err: TextError) -> Self {
        match err {
            TextError::Empty => SummaryError::EmptyContent,
        }
    }
}

impl SummaryError {
    /// Whether the error was caused by the caller's input rather than by a backend.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SummaryError::InvalidInput(_)
                | SummaryError::EmptyContent
                | SummaryError::UnknownSummaryType(_)
        )
    }
}

/// Type alias for Results that can fail with a [`SummaryError`].
pub type SummaryResult<T> = Result<T, SummaryError>;
