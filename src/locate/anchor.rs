//! Anchor scan: walk pages looking for the table heading.

use crate::cache::DocumentCache;
use crate::config::{Anchor, RunMode, ScanConfig, ScanDirection};
use crate::document::SourceDocument;
use crate::error::Result;
use crate::model::PageSet;

use super::matching::{anchor_matches, compact};

/// What a page says about the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageHit {
    anchor: bool,
    name: bool,
}

impl PageHit {
    fn matches(&self, require_name: bool) -> bool {
        self.anchor && (self.name || !require_name)
    }
}

/// Scans pages of one document for one anchor.
pub(crate) struct AnchorScan<'a> {
    document: &'a dyn SourceDocument,
    cache: &'a DocumentCache,
    anchor: &'a Anchor,
    target: String,
}

impl<'a> AnchorScan<'a> {
    /// `target` is the cleaned fund name; it is compared in compact form.
    pub fn new(
        document: &'a dyn SourceDocument,
        cache: &'a DocumentCache,
        anchor: &'a Anchor,
        target: &str,
    ) -> Self {
        Self {
            document,
            cache,
            anchor,
            target: compact(target),
        }
    }

    fn inspect(&self, page: u32) -> Result<PageHit> {
        let text = self.cache.page_text(self.document, page)?;
        let anchor = anchor_matches(self.anchor, &text);
        let name = anchor && !self.target.is_empty() && compact(&text).contains(&self.target);
        Ok(PageHit { anchor, name })
    }

    /// Page walk order for a scan over the whole document.
    fn walk(&self, direction: ScanDirection) -> Vec<u32> {
        let count = self.document.page_count();
        match direction {
            ScanDirection::Forward => (1..=count).collect(),
            ScanDirection::Backward => (1..=count).rev().collect(),
            ScanDirection::Window { start, end } => (start.max(1)..=end.min(count)).collect(),
        }
    }

    /// Scan the whole document.
    pub fn scan(&self, config: &ScanConfig) -> Result<Option<PageSet>> {
        let order = self.walk(config.direction);
        match config.run {
            RunMode::Contiguous => self.contiguous(&order, config.require_name, config.max_pages),
            RunMode::UntilNextAnchor => self.until_next_anchor(&order, config),
        }
    }

    /// Scan only the given pages, forward, for a contiguous anchor run.
    pub fn refine(&self, pages: &PageSet) -> Result<Option<PageSet>> {
        let order: Vec<u32> = pages.iter().collect();
        self.contiguous(&order, false, None)
    }

    /// Collect the first run of consecutive matching pages in walk order.
    fn contiguous(
        &self,
        order: &[u32],
        require_name: bool,
        max_pages: Option<u32>,
    ) -> Result<Option<PageSet>> {
        let limit = max_pages.map(|m| m as usize).unwrap_or(usize::MAX);
        let mut run = Vec::new();

        for &page in order {
            if self.inspect(page)?.matches(require_name) {
                run.push(page);
                if run.len() >= limit {
                    break;
                }
            } else if !run.is_empty() {
                break;
            }
        }

        Ok((!run.is_empty()).then(|| PageSet::from_pages(run)))
    }

    /// From the first matching page, take following pages until one opens
    /// another fund's table (anchor present, target name absent).
    fn until_next_anchor(&self, order: &[u32], config: &ScanConfig) -> Result<Option<PageSet>> {
        let mut first = None;
        for &page in order {
            if self.inspect(page)?.matches(config.require_name) {
                first = Some(page);
                break;
            }
        }
        let Some(first) = first else {
            return Ok(None);
        };

        let count = self.document.page_count();
        let limit = config.max_pages.unwrap_or(u32::MAX).max(1);
        let mut last = first;

        for page in first + 1..=count {
            if page - first >= limit {
                break;
            }
            let hit = self.inspect(page)?;
            if hit.anchor && !hit.name {
                break;
            }
            last = page;
        }

        Ok(Some(PageSet::range(first, last)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MemoryDocument, MemoryPage};

    fn report() -> MemoryDocument {
        MemoryDocument::with_blank_pages("report.pdf", 20)
            .set_page(3, MemoryPage::new().text("Holdings Table\nFund Beta"))
            .set_page(4, MemoryPage::new().text("Holdings Table\nFund Beta"))
            .set_page(8, MemoryPage::new().text("Holdings Table\nFund Alpha"))
            .set_page(9, MemoryPage::new().text("Holdings Table\nFund Alpha"))
            .set_page(10, MemoryPage::new().text("continued"))
            .set_page(11, MemoryPage::new().text("Holdings Table\nFund Alpha"))
            .set_page(12, MemoryPage::new().text("Holdings Table\nFund Gamma"))
    }

    fn scan(doc: &MemoryDocument, target: &str, config: ScanConfig) -> Option<PageSet> {
        let cache = DocumentCache::new();
        let anchor = Anchor::literal("Holdings Table");
        AnchorScan::new(doc, &cache, &anchor, target)
            .scan(&config)
            .unwrap()
    }

    #[test]
    fn test_forward_contiguous() {
        let pages = scan(&report(), "Fund Alpha", ScanConfig::new()).unwrap();
        assert_eq!(pages, PageSet::range(8, 9));
    }

    #[test]
    fn test_backward_contiguous() {
        let config = ScanConfig::new().with_direction(ScanDirection::Backward);
        let pages = scan(&report(), "Fund Alpha", config.clone()).unwrap();
        assert_eq!(pages.pages(), &[11]);

        let pages = scan(&report(), "Fund Beta", config).unwrap();
        assert_eq!(pages, PageSet::range(3, 4));
    }

    #[test]
    fn test_until_next_anchor() {
        let config = ScanConfig::new().with_run(RunMode::UntilNextAnchor);
        let pages = scan(&report(), "Fund Alpha", config).unwrap();
        assert_eq!(pages, PageSet::range(8, 11));
    }

    #[test]
    fn test_until_next_anchor_capped() {
        let config = ScanConfig::new()
            .with_run(RunMode::UntilNextAnchor)
            .with_max_pages(2);
        let pages = scan(&report(), "Fund Alpha", config).unwrap();
        assert_eq!(pages, PageSet::range(8, 9));
    }

    #[test]
    fn test_window() {
        let config = ScanConfig::new().with_direction(ScanDirection::Window { start: 9, end: 15 });
        let pages = scan(&report(), "Fund Alpha", config).unwrap();
        assert_eq!(pages.pages(), &[9]);
    }

    #[test]
    fn test_name_not_required() {
        let config = ScanConfig::new().with_require_name(false);
        let pages = scan(&report(), "Fund Alpha", config).unwrap();
        assert_eq!(pages, PageSet::range(3, 4));
    }

    #[test]
    fn test_not_found() {
        assert!(scan(&report(), "Fund Delta", ScanConfig::new()).is_none());
    }

    #[test]
    fn test_refine_within_range() {
        let doc = report();
        let cache = DocumentCache::new();
        let anchor = Anchor::literal("Holdings Table");
        let refined = AnchorScan::new(&doc, &cache, &anchor, "Fund Alpha")
            .refine(&PageSet::range(6, 12))
            .unwrap();
        assert_eq!(refined, Some(PageSet::range(8, 9)));
    }
}
