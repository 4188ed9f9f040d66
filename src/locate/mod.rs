//! Page location: find the pages that carry a fund's holdings table.
//!
//! Two strategies exist. The table-of-contents lookup reads the report's
//! contents pages and derives a page range from the fund's entry; the
//! anchor scan walks pages looking for the table heading next to the fund
//! name. When both are configured the contents lookup runs first and the
//! anchor scan is the fallback.

mod anchor;
pub mod matching;
mod toc;

pub use toc::{read_entries, region_for, TocEntry};

use thiserror::Error;

use crate::cache::DocumentCache;
use crate::config::LocatorConfig;
use crate::document::SourceDocument;
use crate::error::Error;
use crate::model::PageSet;

use anchor::AnchorScan;

/// Why no pages were located.
#[derive(Error, Debug)]
pub enum LocateError {
    /// No strategy found the fund. Non-fatal: the caller skips the fund.
    #[error("no pages found for {0:?}")]
    NotFound(String),

    /// The document could not be read while locating.
    #[error(transparent)]
    Document(#[from] Error),
}

/// Locates table pages under one locator configuration.
pub struct PageLocator<'a> {
    config: &'a LocatorConfig,
    cache: &'a DocumentCache,
}

impl<'a> PageLocator<'a> {
    /// Create a locator.
    pub fn new(config: &'a LocatorConfig, cache: &'a DocumentCache) -> Self {
        Self { config, cache }
    }

    /// Find the pages of `target_name`'s table.
    pub fn locate(
        &self,
        document: &dyn SourceDocument,
        target_name: &str,
    ) -> Result<PageSet, LocateError> {
        let cleaned = self.config.name_cleaner.apply(target_name);

        if let Some(toc) = &self.config.toc {
            let entries = read_entries(document, toc, self.cache)?;
            let region = region_for(
                &entries,
                target_name,
                &self.config.name_cleaner,
                toc,
                document.page_count(),
            );

            match (region, &self.config.table_anchor) {
                (Some(region), Some(anchor)) if toc.refine_with_anchor => {
                    let scan = AnchorScan::new(document, self.cache, anchor, &cleaned);
                    match scan.refine(&region)? {
                        Some(refined) => {
                            log::debug!(
                                "{}: {:?} located via contents at {:?}",
                                document.id(),
                                target_name,
                                refined.pages()
                            );
                            return Ok(refined);
                        }
                        None => {
                            log::debug!(
                                "{}: no anchor inside contents range {:?}, keeping it whole",
                                document.id(),
                                region.pages()
                            );
                            return Ok(region);
                        }
                    }
                }
                (Some(region), _) => {
                    log::debug!(
                        "{}: {:?} located via contents at {:?}",
                        document.id(),
                        target_name,
                        region.pages()
                    );
                    return Ok(region);
                }
                (None, _) => {
                    log::debug!(
                        "{}: {:?} not in {} contents entries",
                        document.id(),
                        target_name,
                        entries.len()
                    );
                }
            }
        }

        if let Some(anchor) = &self.config.table_anchor {
            let scan = AnchorScan::new(document, self.cache, anchor, &cleaned);
            if let Some(pages) = scan.scan(&self.config.scan)? {
                log::debug!(
                    "{}: {:?} located via anchor scan at {:?}",
                    document.id(),
                    target_name,
                    pages.pages()
                );
                return Ok(pages);
            }
        }

        Err(LocateError::NotFound(target_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Anchor, TocConfig};
    use crate::document::{MemoryDocument, MemoryPage};

    fn report() -> MemoryDocument {
        let contents = MemoryPage::new()
            .line(&[(40.0, "Table des matières")])
            .line(&[(40.0, "Fund Alpha"), (460.0, "12")])
            .line(&[(40.0, "Fund Beta"), (460.0, "20")]);
        let mut doc = MemoryDocument::with_blank_pages("report.pdf", 25).set_page(2, contents);
        for page in 13..=15 {
            doc = doc.set_page(page, MemoryPage::new().text("Fund Alpha\nHoldings Table"));
        }
        doc.set_page(21, MemoryPage::new().text("Fund Beta\nHoldings Table"))
    }

    fn toc() -> TocConfig {
        TocConfig::new(Anchor::literal("Table des matières"), 450.0)
    }

    #[test]
    fn test_toc_refined_by_anchor() {
        let config = LocatorConfig::new()
            .with_toc(toc().refined())
            .with_anchor(Anchor::literal("Holdings Table"));
        let cache = DocumentCache::new();
        let pages = PageLocator::new(&config, &cache)
            .locate(&report(), "Fund Alpha")
            .unwrap();
        assert_eq!(pages.pages(), &[13, 14, 15]);
    }

    #[test]
    fn test_toc_unrefined() {
        let config = LocatorConfig::new().with_toc(toc());
        let cache = DocumentCache::new();
        let pages = PageLocator::new(&config, &cache)
            .locate(&report(), "Fund Alpha")
            .unwrap();
        assert_eq!(pages, PageSet::range(12, 19));
    }

    #[test]
    fn test_anchor_fallback() {
        let config = LocatorConfig::new()
            .with_toc(toc())
            .with_anchor(Anchor::literal("Holdings Table"));
        let doc = report().set_page(22, MemoryPage::new().text("Fund Omega\nHoldings Table"));
        let cache = DocumentCache::new();
        let pages = PageLocator::new(&config, &cache)
            .locate(&doc, "Fund Omega")
            .unwrap();
        assert_eq!(pages.pages(), &[22]);
    }

    #[test]
    fn test_not_found() {
        let config = LocatorConfig::new().with_anchor(Anchor::literal("Holdings Table"));
        let cache = DocumentCache::new();
        let err = PageLocator::new(&config, &cache)
            .locate(&report(), "Fund Delta")
            .unwrap_err();
        assert!(matches!(err, LocateError::NotFound(name) if name == "Fund Delta"));
    }
}
