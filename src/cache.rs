//! Memoization of expensive per-document work.
//!
//! Page text, table-of-contents entries and extracted grids are stored in
//! [`DashMap`]s so concurrent fund jobs over the same report share them.
//! Every key starts with the document's [`DocumentKey`], never its bare
//! name, so two reports sharing a file name do not see each other's work.
//! Each key is written at most once: a miss computes the value without
//! holding any lock, and when two workers race the first insert wins while
//! the loser's (identical) result is discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::{Anchor, TocConfig};
use crate::document::SourceDocument;
use crate::error::Result;
use crate::extract::ExtractedGrid;
use crate::locate::TocEntry;
use crate::model::{DocumentKey, ExtractionMode, PageSet, TableRegion};

/// Cache key for table-of-contents entries: the document plus every
/// setting that changes how the contents pages are read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TocKey {
    document: DocumentKey,
    anchor: String,
    search_pages: u32,
    page_column_x: u32,
    area: Option<[u32; 4]>,
    stop_entry: Option<String>,
}

impl TocKey {
    pub fn new(document: &DocumentKey, toc: &TocConfig) -> Self {
        let anchor = match &toc.anchor {
            Anchor::Literal(text) => format!("literal:{}", text),
            Anchor::Regex(pattern) => format!("regex:{}", pattern.as_str()),
        };
        Self {
            document: document.clone(),
            anchor,
            search_pages: toc.search_pages,
            page_column_x: toc.page_column_x.to_bits(),
            area: toc.area.as_ref().map(|a| a.bits()),
            stop_entry: toc.stop_entry.clone(),
        }
    }
}

/// Cache key for an extracted grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridKey {
    document: DocumentKey,
    pages: PageSet,
    boundaries: Vec<u32>,
    mode: ExtractionMode,
    area: Option<[u32; 4]>,
    panels: usize,
}

impl GridKey {
    pub fn new(document: &DocumentKey, region: &TableRegion) -> Self {
        Self {
            document: document.clone(),
            pages: region.pages.clone(),
            boundaries: region.column_boundaries.iter().map(|b| b.to_bits()).collect(),
            mode: region.mode,
            area: region.area.as_ref().map(|a| a.bits()),
            panels: region.panels,
        }
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub page_texts: usize,
    pub tocs: usize,
    pub grids: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Shared cache for one batch run.
#[derive(Debug, Default)]
pub struct DocumentCache {
    page_texts: DashMap<(DocumentKey, u32), Arc<str>>,
    tocs: DashMap<TocKey, Arc<Vec<TocEntry>>>,
    grids: DashMap<GridKey, Arc<ExtractedGrid>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DocumentCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain text of a page.
    pub fn page_text(&self, document: &dyn SourceDocument, page: u32) -> Result<Arc<str>> {
        let key = (document.key().clone(), page);
        self.get_or_compute(&self.page_texts, key, || {
            document.page_text(page).map(Arc::from)
        })
    }

    /// Table-of-contents entries of a document.
    pub fn toc_entries<F>(&self, key: TocKey, compute: F) -> Result<Arc<Vec<TocEntry>>>
    where
        F: FnOnce() -> Result<Vec<TocEntry>>,
    {
        self.get_or_compute(&self.tocs, key, || compute().map(Arc::new))
    }

    /// Extracted grid of a table region.
    pub fn grid<F>(
        &self,
        document: &DocumentKey,
        region: &TableRegion,
        compute: F,
    ) -> Result<Arc<ExtractedGrid>>
    where
        F: FnOnce() -> Result<ExtractedGrid>,
    {
        self.get_or_compute(&self.grids, GridKey::new(document, region), || compute().map(Arc::new))
    }

    fn get_or_compute<K, V, F>(&self, map: &DashMap<K, V>, key: K, compute: F) -> Result<V>
    where
        K: std::hash::Hash + Eq,
        V: Clone,
        F: FnOnce() -> Result<V>,
    {
        if let Some(hit) = map.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit.value().clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute()?;
        let entry = map.entry(key).or_insert(value);
        Ok(entry.value().clone())
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            page_texts: self.page_texts.len(),
            tocs: self.tocs.len(),
            grids: self.grids.len(),
        }
    }

    /// Drop every entry belonging to a document.
    pub fn evict_document(&self, document: &DocumentKey) {
        self.page_texts.retain(|(doc, _), _| doc != document);
        self.tocs.retain(|key, _| &key.document != document);
        self.grids.retain(|key, _| &key.document != document);
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.page_texts.clear();
        self.tocs.clear();
        self.grids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MemoryDocument, MemoryPage};
    use crate::error::Error;
    use std::sync::atomic::AtomicUsize;

    fn doc() -> MemoryDocument {
        MemoryDocument::new("report.pdf")
            .push_page(MemoryPage::new().text("page one"))
            .push_page(MemoryPage::new().text("page two"))
    }

    #[test]
    fn test_page_text_cached() {
        let cache = DocumentCache::new();
        let doc = doc();

        assert_eq!(&*cache.page_text(&doc, 1).unwrap(), "page one");
        assert_eq!(&*cache.page_text(&doc, 1).unwrap(), "page one");
        assert_eq!(&*cache.page_text(&doc, 2).unwrap(), "page two");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.page_texts, 2);
    }

    #[test]
    fn test_errors_not_cached() {
        let cache = DocumentCache::new();
        let doc = doc();
        assert!(matches!(
            cache.page_text(&doc, 9),
            Err(Error::PageOutOfRange(9, 2))
        ));
        assert_eq!(cache.stats().page_texts, 0);
    }

    #[test]
    fn test_grid_computed_once() {
        let cache = DocumentCache::new();
        let doc = doc();
        let region = TableRegion::new("report.pdf".into(), PageSet::range(1, 2), vec![100.0]);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let grid = cache
                .grid(doc.key(), &region, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(ExtractedGrid::default())
                })
                .unwrap();
            assert!(grid.rows.is_empty());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Different geometry is a different key
        let other = region.clone().with_panels(2);
        cache.grid(doc.key(), &other, || Ok(ExtractedGrid::default())).unwrap();
        assert_eq!(cache.stats().grids, 2);
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = DocumentCache::new();
        let key = DocumentKey::unique("report.pdf");
        let region = TableRegion::new("report.pdf".into(), PageSet::range(1, 1), vec![]);

        let first = cache
            .grid(&key, &region, || {
                Ok(ExtractedGrid {
                    geometry_mismatches: 1,
                    ..Default::default()
                })
            })
            .unwrap();
        let second = cache
            .grid(&key, &region, || {
                Ok(ExtractedGrid {
                    geometry_mismatches: 2,
                    ..Default::default()
                })
            })
            .unwrap();
        assert_eq!(first.geometry_mismatches, 1);
        assert_eq!(second.geometry_mismatches, 1);
    }

    #[test]
    fn test_concurrent_access() {
        use rayon::prelude::*;

        let cache = DocumentCache::new();
        let doc = doc();
        (0..64).into_par_iter().for_each(|i| {
            let page = (i % 2) + 1;
            cache.page_text(&doc, page).unwrap();
        });
        let stats = cache.stats();
        assert_eq!(stats.page_texts, 2);
        assert_eq!(stats.hits + stats.misses, 64);
    }

    #[test]
    fn test_evict_document() {
        let cache = DocumentCache::new();
        let doc = doc();
        cache.page_text(&doc, 1).unwrap();
        cache.evict_document(doc.key());
        assert_eq!(cache.stats().page_texts, 0);
    }

    #[test]
    fn test_same_name_documents_kept_apart() {
        let cache = DocumentCache::new();
        let first = MemoryDocument::new("annual_report.pdf").push_page(MemoryPage::new().text("provider a"));
        let second = MemoryDocument::new("annual_report.pdf").push_page(MemoryPage::new().text("provider b"));
        assert_eq!(first.id(), second.id());

        assert_eq!(&*cache.page_text(&first, 1).unwrap(), "provider a");
        assert_eq!(&*cache.page_text(&second, 1).unwrap(), "provider b");
        assert_eq!(cache.stats().hits, 0);

        let region = TableRegion::new("annual_report.pdf".into(), PageSet::range(1, 1), vec![]);
        cache.grid(first.key(), &region, || Ok(ExtractedGrid::default())).unwrap();
        let other = cache
            .grid(second.key(), &region, || {
                Ok(ExtractedGrid {
                    geometry_mismatches: 3,
                    ..Default::default()
                })
            })
            .unwrap();
        assert_eq!(other.geometry_mismatches, 3);

        cache.evict_document(first.key());
        assert_eq!(cache.stats().page_texts, 1);
        assert_eq!(cache.stats().grids, 1);
    }
}
