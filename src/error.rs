// src/error.rs

use thiserror::Error;

/// Every condition that halts a pipeline cycle.
///
/// An empty filter result is deliberately absent: it is a valid outcome and
/// is reported through [`crate::pipeline::Report::is_empty`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The uploaded file is empty or could not be parsed.
    #[error("the uploaded file `{source_name}` is empty or invalid: {reason}")]
    EmptyOrInvalidInput { source_name: String, reason: String },

    /// The file extension is neither `.csv` nor `.xlsx`.
    #[error("unsupported file type for `{source_name}`; please upload a CSV or Excel file")]
    UnsupportedFileType { source_name: String },

    /// No column matched any of the amount synonyms.
    #[error("neither a 'Sales' nor a 'Revenue' column was found (columns: {})", .columns.join(", "))]
    MissingAmount { columns: Vec<String> },
}

impl PipelineError {
    pub(crate) fn invalid(source_name: &str, reason: impl ToString) -> Self {
        PipelineError::EmptyOrInvalidInput {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
