//! PDF file structure parser
//!
//! This module reconstructs the object graph of a PDF file from the
//! cross-reference data at its tail, according to ISO 32000-1 Section 7.5
//! and ISO 32000-2.

pub mod filters;
pub mod header;
pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod page_tree;
pub mod xref;

pub use self::objects::{PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString};

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// PDF parser errors
///
/// Variants that quote an offending literal carry it so that the reported
/// diagnostic can show what was actually read from the file.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad header '{0}'.")]
    InvalidHeader(String),

    #[error("Unable to find start of xref table.")]
    XrefLocate,

    #[error("Bad xref table header '{0}'.")]
    InvalidXrefHeader(String),

    #[error("Malformed xref table section '{0}'.")]
    MalformedXrefSection(String),

    #[error("Malformed xref table entry '{0}'.")]
    MalformedXrefEntry(String),

    #[error("Missing trailer.")]
    MissingTrailer,

    #[error("Trailer is not a dictionary.")]
    TrailerNotDictionary,

    #[error("Unable to read cross-reference stream dictionary.")]
    XrefStreamDictionary,

    #[error("Cross-reference stream does not have a dictionary.")]
    XrefStreamNotDictionary,

    #[error("Unable to get stream after xref dictionary.")]
    XrefStreamBegin,

    #[error("Cross-reference stream does not have required W key.")]
    MissingWKey,

    #[error("Cross-reference stream has invalid W key.")]
    InvalidWKey,

    #[error("Multiple indices not supported in cross-reference stream.")]
    MultipleIndices,

    #[error("Missing Root object.")]
    MissingRoot,

    #[error("Unable to open compressed object stream {0}.")]
    ObjectStreamOpen(u32),

    #[error("Unable to read compressed object stream {0}.")]
    ObjectStreamRead(u32),

    #[error("Unable to find compressed object stream {0}.")]
    ObjectStreamNotFound(u32),

    #[error("Too many compressed objects in one stream.")]
    TooManyCompressedObjects,

    #[error("Syntax error at position {position}: {message}")]
    SyntaxError { position: u64, message: String },

    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Invalid object reference: {0} {1} R")]
    InvalidReference(u32, u16),

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Stream decode error: {0}")]
    StreamDecode(String),

    #[error("{0}")]
    PageTree(String),
}
