use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure category shared by every pipeline stage.
///
/// Callers branch on the kind to decide whether to abort the run or carry on
/// with partial output; `code` stays the stable machine-readable identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A remote service or the database could not be reached.
    Connection,
    /// A malformed request: bad identifier, unknown table/column, invalid address.
    Query,
    /// Nothing to work on (no rows, no documents, no index).
    EmptyInput,
    /// Credentials were rejected by the model provider or the mail relay.
    Authentication,
    /// The index directory is missing, unreadable or unwritable.
    Io,
    Config,
    /// The provider answered, but not with something usable.
    Provider,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Query => "query",
            ErrorKind::EmptyInput => "empty_input",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Io => "io",
            ErrorKind::Config => "config",
            ErrorKind::Provider => "provider",
        };
        f.write_str(s)
    }
}

/// Single structured error shape used across the workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(d) = &self.details {
            write!(f, " ({d})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}
