//! # pdfholdings
//!
//! Holdings table extraction from fund report PDFs.
//!
//! Given a periodic fund report and a fund name, the library locates the
//! pages carrying that fund's securities table, reads the table from
//! configured column geometry, joins holding names that wrap over several
//! lines and normalizes numbers and currencies into typed records.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfholdings::{extract_from_file, ExtractionConfig, FundRequest};
//!
//! fn main() -> pdfholdings::Result<()> {
//!     let json = std::fs::read_to_string("amundi.json")?;
//!     let config = ExtractionConfig::from_json(&json)?;
//!
//!     match extract_from_file("report.pdf", &FundRequest::new("Amundi Actions Europe"), &config) {
//!         Ok(table) => println!("{}", table.to_json()?),
//!         Err(failure) => eprintln!("{}", failure),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Page location**: table-of-contents lookup or anchor scan, per template
//! - **Stream and lattice tables**: column boundaries or drawn rulings
//! - **Wrapped names**: fragments joined onto the row carrying the values
//! - **Locale-aware numbers**: comma or dot decimals, parentheses, dashes
//! - **Currency recovery**: forward fill, heading hints, embedded codes
//! - **Batch runs**: rayon pool, shared page cache, per-call timeouts

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod filter;
pub mod locate;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod reassemble;

// Re-export commonly used types
pub use cache::{CacheStats, DocumentCache};
pub use config::{
    Anchor, ColumnRole, CurrencyConfig, ExtractionConfig, LocatorConfig, NoiseConfig,
    NumericLocale, Pattern, Provider, ProviderRegistry, ScanConfig, TableConfig, TocConfig,
};
pub use document::{MemoryDocument, MemoryPage, PdfDocument, SourceDocument, TimeoutDocument};
pub use error::{Error, ExtractionFailure, FailureReason, Result, RowError};
pub use model::{
    CanonicalRecord, DocumentId, DocumentKey, ExtractionMode, FundInfo, FundRequest,
    HoldingsTable, PageSet, TableStats,
};
pub use pipeline::{
    extract_fund, BatchOptions, BatchRunner, CancelToken, DocumentLoader, FundJob, JobOutcome,
    JobSource, Pipeline,
};

use std::path::Path;

/// Open a PDF file as a source document.
///
/// # Example
///
/// ```no_run
/// use pdfholdings::{open_pdf, SourceDocument};
///
/// let doc = open_pdf("report.pdf").unwrap();
/// println!("Pages: {}", doc.page_count());
/// ```
pub fn open_pdf<P: AsRef<Path>>(path: P) -> Result<PdfDocument> {
    PdfDocument::load_file(path)
}

/// Extract one fund's holdings from a PDF file.
///
/// A file that cannot be opened fails with [`FailureReason::Unreadable`].
pub fn extract_from_file<P: AsRef<Path>>(
    path: P,
    request: &FundRequest,
    config: &ExtractionConfig,
) -> std::result::Result<HoldingsTable, ExtractionFailure> {
    let document = open_pdf(path).map_err(|err| {
        ExtractionFailure::new(FailureReason::from(&err), request.fund_name_report.clone())
    })?;
    extract_fund(&document, request, config)
}

/// Extract one fund's holdings from a PDF file, trying a provider's
/// templates in order.
pub fn extract_with_provider<P: AsRef<Path>>(
    path: P,
    request: &FundRequest,
    provider: &Provider,
) -> std::result::Result<HoldingsTable, ExtractionFailure> {
    let document = open_pdf(path).map_err(|err| {
        ExtractionFailure::new(FailureReason::from(&err), request.fund_name_report.clone())
    })?;
    let cache = DocumentCache::new();
    Pipeline::new(&cache).run_provider(&document, request, provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExtractionConfig {
        let table = TableConfig::new(
            vec![200.0, 300.0, 400.0],
            vec![
                ColumnRole::HoldingName,
                ColumnRole::Currency,
                ColumnRole::MarketValue,
                ColumnRole::NetAssets,
            ],
        );
        ExtractionConfig::new("test", table)
            .with_locator(LocatorConfig::new().with_anchor(Anchor::literal("Portefeuille")))
    }

    // ==================== File Entry Points ====================

    #[test]
    fn test_open_missing_file() {
        let result = open_pdf("does-not-exist.pdf");
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_from_missing_file() {
        let request = FundRequest::new("Fund Alpha");
        let failure = extract_from_file("does-not-exist.pdf", &request, &config()).unwrap_err();
        assert!(matches!(failure.reason, FailureReason::Unreadable(_)));
        assert_eq!(failure.fund, "Fund Alpha");
    }

    #[test]
    fn test_extract_with_provider_from_garbage_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a pdf").unwrap();

        let provider = Provider::new("test", config());
        let failure =
            extract_with_provider(file.path(), &FundRequest::new("Fund Alpha"), &provider).unwrap_err();
        assert!(matches!(failure.reason, FailureReason::Unreadable(_)));
    }

    // ==================== In-Memory Documents ====================

    #[test]
    fn test_extract_fund_from_memory() {
        let doc = MemoryDocument::new("memory.pdf").push_page(
            MemoryPage::new()
                .line(&[(10.0, "Portefeuille Fund Alpha")])
                .line(&[(10.0, "Acme"), (210.0, "EUR"), (310.0, "100"), (410.0, "1,5")]),
        );
        let config = config().with_noise(NoiseConfig::default().deny(["Portefeuille Fund Alpha"]));

        let table = extract_fund(&doc, &FundRequest::new("Fund Alpha"), &config).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].net_assets, 1.5);
        assert_eq!(table.fund().fund_name_report, "Fund Alpha");
    }
}
