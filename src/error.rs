use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while decoding an EDF/EDF+ file.
///
/// Every variant means the file could not be read as a valid recording.
#[derive(Debug, Error)]
pub enum EdfError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Invalid header size: declared {declared}, expected {expected}")]
    InvalidHeader { declared: i64, expected: i64 },

    #[error("Invalid number of signals: {0}")]
    InvalidSignalCount(i32),

    #[error("Signal {0}: physical min equals physical max")]
    PhysicalMinEqualsMax(usize),

    #[error("Signal {0}: digital min equals digital max")]
    DigitalMinEqualsMax(usize),

    #[error("File is truncated: expected at least {expected} bytes, found {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("Invalid annotation list in data record {record}: {reason}")]
    InvalidAnnotation { record: i64, reason: String },
}

impl EdfError {
    /// True when the error describes damaged content rather than an
    /// environmental problem such as a missing permission.
    pub fn is_corruption(&self) -> bool {
        match self {
            EdfError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            _ => true,
        }
    }
}

/// Crate-level error taxonomy: parse, I/O, validation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: EdfError,
    },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn parse(path: impl Into<PathBuf>, source: EdfError) -> Self {
        Error::Parse { path: path.into(), source }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    /// True for parse errors that indicate a damaged recording.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Parse { source, .. } if source.is_corruption())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Result alias for the low-level EDF layer.
pub type EdfResult<T> = std::result::Result<T, EdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_classification() {
        let eof = EdfError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        let denied = EdfError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(eof.is_corruption());
        assert!(!denied.is_corruption());
        assert!(EdfError::InvalidSignalCount(0).is_corruption());

        assert!(Error::parse("a.edf", EdfError::InvalidFormat("x".into())).is_corruption());
        assert!(!Error::parse("a.edf", denied).is_corruption());
        assert!(!Error::Validation("missing".into()).is_corruption());
    }
}
