//! Table extraction: turn a located region into a raw text grid.
//!
//! Stream mode assigns text to columns by configured x boundaries. Lattice
//! mode reads cells from ruling lines and tags rows whose cell count does
//! not match the schema; pages without rulings fall back to stream mode.
//! Rows are returned top to bottom, page by page, and the same region
//! always produces the same grid.

mod lattice;
mod stream;

use serde::{Deserialize, Serialize};

use crate::cache::DocumentCache;
use crate::document::SourceDocument;
use crate::error::Result;
use crate::model::{ExtractionMode, RawRow, TableRegion};

/// Raw rows of a region plus extraction diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedGrid {
    /// Rows in reading order
    pub rows: Vec<RawRow>,
    /// Rows tagged with a geometry mismatch
    pub geometry_mismatches: usize,
}

impl ExtractedGrid {
    /// Check if every row is a geometry mismatch (and there is at least one).
    pub fn all_mismatched(&self) -> bool {
        !self.rows.is_empty() && self.geometry_mismatches == self.rows.len()
    }
}

/// Configuration for table extraction.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Split spans on runs of two or more spaces before column assignment
    pub split_gaps: bool,
    /// Distance within which ruling lines are merged (points)
    pub ruling_tolerance: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            split_gaps: true,
            ruling_tolerance: 2.0,
        }
    }
}

/// Table extractor.
#[derive(Debug, Clone, Default)]
pub struct TableExtractor {
    config: ExtractorConfig,
}

impl TableExtractor {
    /// Create a new extractor with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor with custom configuration.
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extract a region, reusing a cached grid when the same region was
    /// read before.
    pub fn extract_cached(
        &self,
        document: &dyn SourceDocument,
        region: &TableRegion,
        cache: &DocumentCache,
    ) -> Result<std::sync::Arc<ExtractedGrid>> {
        cache.grid(document.key(), region, || self.extract(document, region))
    }

    /// Extract the raw grid of a region.
    pub fn extract(&self, document: &dyn SourceDocument, region: &TableRegion) -> Result<ExtractedGrid> {
        let mut grid = ExtractedGrid::default();
        let mut next_index = 0usize;

        for page in region.pages.iter() {
            let spans = stream::crop(document.page_spans(page)?, region.area.as_ref());

            let rows = match region.mode {
                ExtractionMode::Stream => self.stream_page(spans, region, page, &mut next_index),
                ExtractionMode::Lattice => {
                    let rulings = document.page_rulings(page)?;
                    match lattice::read_page(
                        &spans,
                        &rulings,
                        region.area.as_ref(),
                        self.config.ruling_tolerance,
                    ) {
                        Some(rows) => self.lattice_rows(rows, region, page, &mut next_index),
                        None => {
                            log::warn!(
                                "{}: page {} has no ruling grid, reading it as stream",
                                document.id(),
                                page
                            );
                            self.stream_page(spans, region, page, &mut next_index)
                        }
                    }
                }
            };

            grid.geometry_mismatches += rows.iter().filter(|r| r.geometry_mismatch).count();
            grid.rows.extend(rows);
        }

        log::debug!(
            "{}: extracted {} rows from pages {:?} ({} mismatched)",
            document.id(),
            grid.rows.len(),
            region.pages.pages(),
            grid.geometry_mismatches
        );
        Ok(grid)
    }

    fn stream_page(
        &self,
        spans: Vec<crate::document::TextSpan>,
        region: &TableRegion,
        page: u32,
        next_index: &mut usize,
    ) -> Vec<RawRow> {
        let physical = stream::read_page(spans, &region.column_boundaries, self.config.split_gaps);
        stream::split_panels(physical, region.panels, page, next_index)
    }

    fn lattice_rows(
        &self,
        rows: Vec<lattice::LatticeRow>,
        region: &TableRegion,
        page: u32,
        next_index: &mut usize,
    ) -> Vec<RawRow> {
        let expected = region.column_count();
        let mut matched = Vec::new();
        let mut out = Vec::new();

        for row in rows {
            if row.cells.len() == expected {
                matched.push(row.cells);
            } else {
                // Flush so row order is preserved around the mismatch
                out.extend(stream::split_panels(
                    std::mem::take(&mut matched),
                    region.panels,
                    page,
                    next_index,
                ));
                let mut raw = RawRow::new(row.cells, page, *next_index);
                raw.geometry_mismatch = true;
                *next_index += 1;
                out.push(raw);
            }
        }
        out.extend(stream::split_panels(matched, region.panels, page, next_index));
        out
    }
}
