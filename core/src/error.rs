use thiserror::Error;

use crate::value::ValueError;

/// Boxed driver error, carried through unchanged.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum TesseraError {
    /// An expression could not be translated to SQL
    #[error("Compilation error: {0}")]
    Compilation(String),

    /// The driver or database rejected the statement
    #[error("Execution error: {0}")]
    Execution(#[source] DriverError),

    /// The cancellation token fired at a suspension point
    #[error("Query cancelled")]
    Cancelled,

    /// A column value could not be converted into the target field
    #[error("Conversion error: column `{column}` into field `{field}`: {source}")]
    Conversion {
        column: String,
        field: &'static str,
        #[source]
        source: ValueError,
    },

    /// Invalid runtime configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TesseraError {
    /// Shorthand for a compilation failure.
    pub fn compilation(message: impl Into<String>) -> Self {
        TesseraError::Compilation(message.into())
    }

    /// Wraps any driver error without reinterpreting it.
    pub fn execution(error: impl Into<DriverError>) -> Self {
        TesseraError::Execution(error.into())
    }

    /// True when the operation was aborted rather than failed.
    #[inline]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, TesseraError::Cancelled)
    }

    /// Returns the underlying driver error, if this is an execution error.
    pub fn driver_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            TesseraError::Execution(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

#[cfg(feature = "rusqlite")]
impl From<rusqlite::Error> for TesseraError {
    fn from(value: rusqlite::Error) -> Self {
        TesseraError::Execution(Box::new(value))
    }
}

#[cfg(feature = "tokio-postgres")]
impl From<tokio_postgres::Error> for TesseraError {
    fn from(value: tokio_postgres::Error) -> Self {
        TesseraError::Execution(Box::new(value))
    }
}

/// Result type for query compilation and execution
pub type Result<T> = std::result::Result<T, TesseraError>;
