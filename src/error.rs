//! Error types for pdfholdings.
//!
//! Three tiers exist: [`Error`] for document and configuration failures,
//! [`RowError`] for recoverable per-row problems that only drop a row, and
//! [`ExtractionFailure`] for a fund that could not produce a table.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CanonicalRecord, TableStats};

/// Result type alias for pdfholdings operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by document access, configuration and the batch runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error parsing PDF structure or a content stream.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted and cannot be read.
    #[error("Document is encrypted")]
    Encrypted,

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Extraction configuration is inconsistent or could not be loaded.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A document call did not return within the configured limit.
    #[error("Document call timed out after {0} ms")]
    Timeout(u64),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Row-level problems. A row carrying one of these is dropped and counted;
/// the rest of the table continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    /// The extracted cell count does not match the configured column schema.
    #[error("Row {row} on page {page} has {found} cells, expected {expected}")]
    GeometryMismatch {
        page: u32,
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A financial cell could not be read as a number.
    #[error("Cannot parse {field} value {value:?}")]
    NumericParse { field: NumericField, value: String },

    /// A non-blank currency cell that is neither a known code nor an alias.
    #[error("Unrecognized currency {0:?}")]
    UnrecognizedCurrency(String),

    /// Blank currency with no earlier observation to inherit from.
    #[error("No currency available for {0:?}")]
    MissingCurrency(String),
}

/// The numeric fields of a holding record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    MarketValue,
    NetAssets,
}

impl std::fmt::Display for NumericField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericField::MarketValue => write!(f, "market value"),
            NumericField::NetAssets => write!(f, "net assets"),
        }
    }
}

/// Why a fund produced no table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum FailureReason {
    /// No page region could be located for the fund.
    PageNotFound,
    /// Rows were extracted but none survived normalization and filtering.
    EmptyAfterFiltering,
    /// Every extracted row disagreed with the configured column schema.
    GeometryMismatch,
    /// The net-assets total fell below the configured sanity threshold.
    BelowSanityThreshold,
    /// A document call exceeded the configured time limit.
    Timeout,
    /// The document could not be read.
    Unreadable(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::PageNotFound => write!(f, "page not found"),
            FailureReason::EmptyAfterFiltering => write!(f, "empty after filtering"),
            FailureReason::GeometryMismatch => write!(f, "geometry mismatch"),
            FailureReason::BelowSanityThreshold => write!(f, "net assets below threshold"),
            FailureReason::Timeout => write!(f, "timed out"),
            FailureReason::Unreadable(msg) => write!(f, "unreadable document: {}", msg),
        }
    }
}

impl From<&Error> for FailureReason {
    fn from(err: &Error) -> Self {
        match err {
            Error::Timeout(_) => FailureReason::Timeout,
            other => FailureReason::Unreadable(other.to_string()),
        }
    }
}

/// A fund-level failure with whatever was salvaged before it happened.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("{fund}: {reason}")]
pub struct ExtractionFailure {
    /// Classified cause.
    pub reason: FailureReason,
    /// Fund name as requested from the report.
    pub fund: String,
    /// Records that did survive, kept for manual follow-up.
    pub partial: Vec<CanonicalRecord>,
    /// Row counters gathered up to the failure.
    pub stats: TableStats,
}

impl ExtractionFailure {
    /// Create a failure with no partial records.
    pub fn new(reason: FailureReason, fund: impl Into<String>) -> Self {
        Self {
            reason,
            fund: fund.into(),
            partial: Vec::new(),
            stats: TableStats::default(),
        }
    }

    /// Attach partial records and statistics.
    pub fn with_partial(mut self, partial: Vec<CanonicalRecord>, stats: TableStats) -> Self {
        self.partial = partial;
        self.stats = stats;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Encrypted;
        assert_eq!(err.to_string(), "Document is encrypted");

        let err = Error::PageOutOfRange(10, 5);
        assert_eq!(
            err.to_string(),
            "Page 10 is out of range (document has 5 pages)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_row_error_display() {
        let err = RowError::NumericParse {
            field: NumericField::NetAssets,
            value: "abc".into(),
        };
        assert_eq!(err.to_string(), "Cannot parse net assets value \"abc\"");
    }

    #[test]
    fn test_failure_reason_from_timeout() {
        let reason = FailureReason::from(&Error::Timeout(250));
        assert_eq!(reason, FailureReason::Timeout);

        let reason = FailureReason::from(&Error::PdfParse("bad xref".into()));
        assert!(matches!(reason, FailureReason::Unreadable(_)));
    }

    #[test]
    fn test_extraction_failure_display() {
        let failure = ExtractionFailure::new(FailureReason::PageNotFound, "Fund Alpha");
        assert_eq!(failure.to_string(), "Fund Alpha: page not found");
        assert!(failure.partial.is_empty());
    }
}
