//! Error types for MARC operations.
//!
//! This module provides the [`MarcError`] type for all marclite operations
//! and the [`Result`] convenience type.

use thiserror::Error;

/// Error type for all marclite operations.
///
/// Represents the error conditions that can occur during format detection,
/// record parsing, encoding, or file I/O.
#[derive(Error, Debug)]
pub enum MarcError {
    /// No detection rule matched the file's extension or content.
    #[error("Unable to detect MARC format for {0}")]
    UnknownFormat(String),

    /// A format name outside the fixed three-format set.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Structural violation while parsing MARCXML or MRK input.
    ///
    /// Unlike binary reads, this aborts the whole file.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Error indicating an invalid or malformed MARC record.
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// An MRK line that does not start with `=` and a 3-character tag.
    #[error("Invalid MRK line: {0}")]
    InvalidLine(String),

    /// An MRK data-field line with fewer than two characters after the tag.
    #[error("Missing indicators for tag {0}")]
    MissingIndicators(String),

    /// A record block that decoded to zero fields.
    #[error("Record contained no MARC fields")]
    EmptyRecord,

    /// Error indicating a truncated or incomplete binary record.
    #[error("Truncated record: {0}")]
    TruncatedRecord(String),

    /// A record cannot be framed in the target format, or field data is not
    /// valid UTF-8 under strict decoding.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;
