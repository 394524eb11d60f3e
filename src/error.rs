use crate::parser::ParseError;
use thiserror::Error;

/// Top-level error type for file operations.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid PDF version '{0}'.")]
    InvalidVersion(String),

    #[error("File is not open for writing.")]
    NotWritable,

    #[error("Missing catalog object.")]
    MissingCatalog,
}

pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_error_display() {
        let err = PdfError::InvalidVersion("3.0".to_string());
        assert_eq!(err.to_string(), "Invalid PDF version '3.0'.");

        let err = PdfError::MissingCatalog;
        assert_eq!(err.to_string(), "Missing catalog object.");
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let err = PdfError::from(io_error);

        match err {
            PdfError::Io(ref inner) => assert_eq!(inner.kind(), ErrorKind::NotFound),
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_parse_error_passthrough() {
        let err = PdfError::from(ParseError::MissingRoot);
        assert_eq!(err.to_string(), "Missing Root object.");
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfError>();
    }
}
