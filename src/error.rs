use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdfError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Field `{field}` is {} bytes, exceeds width of {width}: {value:?}", .value.len())]
    FieldTooLong {
        field: &'static str,
        width: usize,
        value: String,
    },

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Expected {expected} signals, got {actual}")]
    SignalCountMismatch { expected: usize, actual: usize },

    #[error("Data record too large: {bytes} bytes, max is {max} bytes")]
    RecordTooLarge { bytes: usize, max: usize },

    #[error("Signal index {index} out of range ({count} signals)")]
    SignalIndexOutOfRange { index: usize, count: usize },
}

pub type Result<T> = std::result::Result<T, EdfError>;

/// Attaches a description of the attempted operation to IO failures.
pub(crate) trait IoContext<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| EdfError::Io {
            context: context.into(),
            source,
        })
    }
}
