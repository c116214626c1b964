use std::path::PathBuf;

use thiserror::Error;

/// Every way a forecast run can fail. All of them abort the run before the
/// ledger file is touched.
#[derive(Debug, Error)]
pub enum GridcastError {
    /// Network or HTTP failure talking to the weather or actuals source.
    #[error("{source_name} is unavailable: {message}")]
    SourceUnavailable { source_name: String, message: String },

    /// A response arrived but did not have the expected table, column or array.
    #[error("Unexpected data shape: {0}")]
    DataShape(String),

    /// The model artifact is missing/unreadable or a feature vector is malformed.
    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    /// Reading or writing the ledger file failed. The previous file content is intact.
    #[error("Ledger persistence failed for {}: {message}", .path.display())]
    Persistence { path: PathBuf, message: String },
}

impl GridcastError {
    pub fn source_unavailable(source_name: &str, message: impl Into<String>) -> Self {
        Self::SourceUnavailable { source_name: source_name.to_string(), message: message.into() }
    }

    pub fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Persistence { path: path.into(), message: message.to_string() }
    }
}

pub type Result<T, E = GridcastError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_name_the_failure_kind() {
        let err = GridcastError::source_unavailable("Open-Meteo", "timed out");
        assert_eq!(err.to_string(), "Open-Meteo is unavailable: timed out");

        let err = GridcastError::persistence("/tmp/predictions.json", "disk full");
        assert!(err.to_string().contains("/tmp/predictions.json"));
        assert!(err.to_string().contains("disk full"));
    }
}
