use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `EpiError` and maps other errors to
/// convert to an `EpiError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum EpiError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    /// A malformed, missing or out-of-range parameter.
    ConfigurationError(String),
    /// A model invariant was broken. This indicates a logic defect and the
    /// run must stop rather than continue with corrected values.
    InvariantViolation {
        time: f64,
        agent: usize,
        detail: String,
    },
    EpiError(String),
}

impl From<io::Error> for EpiError {
    fn from(error: io::Error) -> Self {
        EpiError::IoError(error)
    }
}

impl From<serde_json::Error> for EpiError {
    fn from(error: serde_json::Error) -> Self {
        EpiError::JsonError(error)
    }
}

impl From<csv::Error> for EpiError {
    fn from(error: csv::Error) -> Self {
        EpiError::CsvError(error)
    }
}

impl From<String> for EpiError {
    fn from(error: String) -> Self {
        EpiError::EpiError(error)
    }
}

impl From<&str> for EpiError {
    fn from(error: &str) -> Self {
        EpiError::EpiError(error.to_string())
    }
}

impl std::error::Error for EpiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EpiError::IoError(error) => Some(error),
            EpiError::JsonError(error) => Some(error),
            EpiError::CsvError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for EpiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EpiError::ConfigurationError(message) => {
                write!(f, "Configuration error: {message}")
            }
            EpiError::InvariantViolation {
                time,
                agent,
                detail,
            } => write!(
                f,
                "Invariant violation at t={time} for agent {agent}: {detail}"
            ),
            _ => write!(f, "Error: {self:?}"),
        }
    }
}
