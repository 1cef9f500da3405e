use thiserror::Error;

/// Failures a pipeline run can end with. Every variant aborts the current run.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Wrong or missing sheet, short column layout, unreadable workbook.
    #[error("{file}: {message}")]
    InputFormat { file: String, message: String },

    #[error("computation failed: {0}")]
    Computation(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub fn input(file: impl Into<String>, message: impl Into<String>) -> Self {
        ReportError::InputFormat {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn render(message: impl std::fmt::Display) -> Self {
        ReportError::Render(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
