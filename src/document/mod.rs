//! Read-only access to source documents.
//!
//! The pipeline only ever sees the [`SourceDocument`] trait: a page count,
//! positioned text spans and ruling lines per page. [`PdfDocument`] reads
//! real reports, [`MemoryDocument`] holds pages built in code, and
//! [`TimeoutDocument`] bounds how long any single page call may block.

mod guard;
pub mod layout;
mod memory;
mod pdf;

pub use guard::{run_with_limit, TimeoutDocument};
pub use layout::{TextLine, TextSpan};
pub use memory::{MemoryDocument, MemoryPage};
pub use pdf::PdfDocument;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{DocumentId, DocumentKey};

/// Segments closer than this to horizontal or vertical count as axis-aligned.
const AXIS_TOLERANCE: f32 = 0.5;

/// A paginated document the engine can read from.
///
/// Pages are 1-indexed. Implementations must be shareable across worker
/// threads; the engine never mutates a document.
pub trait SourceDocument: Send + Sync {
    /// Identity of this loaded instance; cached work is keyed by it.
    fn key(&self) -> &DocumentKey;

    /// Identifier of the document, as reported in record provenance.
    fn id(&self) -> &DocumentId {
        self.key().id()
    }

    /// Number of pages.
    fn page_count(&self) -> u32;

    /// Positioned text spans of a page.
    fn page_spans(&self, page: u32) -> Result<Vec<TextSpan>>;

    /// Plain text of a page, one line per baseline.
    fn page_text(&self, page: u32) -> Result<String> {
        Ok(layout::spans_to_text(&self.page_spans(page)?))
    }

    /// Horizontal and vertical ruling lines drawn on a page.
    fn page_rulings(&self, _page: u32) -> Result<Vec<Ruling>> {
        Ok(Vec::new())
    }
}

/// Reject page numbers outside `1..=count`.
pub(crate) fn check_page(page: u32, count: u32) -> Result<()> {
    if page == 0 || page > count {
        return Err(Error::PageOutOfRange(page, count));
    }
    Ok(())
}

/// An axis-aligned line segment in page user space.
///
/// Coordinates are normalized so that `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ruling {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Ruling {
    /// Horizontal ruling at height `y` from `x0` to `x1`.
    pub fn horizontal(y: f32, x0: f32, x1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y,
            x1: x0.max(x1),
            y1: y,
        }
    }

    /// Vertical ruling at `x` from `y0` to `y1`.
    pub fn vertical(x: f32, y0: f32, y1: f32) -> Self {
        Self {
            x0: x,
            y0: y0.min(y1),
            x1: x,
            y1: y0.max(y1),
        }
    }

    /// Build a ruling from a segment, or `None` when the segment is
    /// diagonal or degenerate.
    pub fn axis_aligned(x0: f32, y0: f32, x1: f32, y1: f32) -> Option<Self> {
        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        if dy <= AXIS_TOLERANCE && dx > AXIS_TOLERANCE {
            Some(Self::horizontal((y0 + y1) / 2.0, x0, x1))
        } else if dx <= AXIS_TOLERANCE && dy > AXIS_TOLERANCE {
            Some(Self::vertical((x0 + x1) / 2.0, y0, y1))
        } else {
            None
        }
    }

    pub fn is_horizontal(&self) -> bool {
        self.y0 == self.y1
    }

    pub fn is_vertical(&self) -> bool {
        self.x0 == self.x1
    }
}
