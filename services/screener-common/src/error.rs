//! Error types shared by the screener crates.

use serde::Serialize;
use thiserror::Error;

/// Errors raised by the service shell itself, outside the screening core.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidInput(_) => 400,
        }
    }
}

/// Structured error object handed to callers across the service boundary.
///
/// Raw error values never cross the boundary; they are flattened into a
/// machine-readable kind and a human-readable message. `detail` narrows the
/// kind when the source has a finer classification, e.g. the provider
/// failure class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorReport {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<&Error> for ErrorReport {
    fn from(err: &Error) -> Self {
        let kind = match err {
            Error::NotFound(_) => "not_found",
            Error::InvalidInput(_) => "invalid_input",
        };
        Self::new(kind, err.to_string())
    }
}
