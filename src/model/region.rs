//! Page sets, table regions and raw grid rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identifier of a source document (usually its file name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a new identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Identity of one loaded document, used to key shared caches.
///
/// Two reports may carry the same [`DocumentId`] (providers reuse file
/// names), so every loaded document draws its own instance number. Clones
/// of a key compare equal; keys from separate loads never do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    id: DocumentId,
    instance: u64,
}

impl DocumentKey {
    /// Allocate a fresh key for a newly loaded document.
    pub fn unique(id: impl Into<DocumentId>) -> Self {
        Self {
            id: id.into(),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// The document's identifier.
    pub fn id(&self) -> &DocumentId {
        &self.id
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.instance)
    }
}

/// An ordered, de-duplicated set of 1-indexed page numbers.
///
/// Page sets may be discontiguous (a table interrupted by a commentary page).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageSet(Vec<u32>);

impl PageSet {
    /// Build a page set from arbitrary page numbers. Zero is not a page and
    /// is discarded.
    pub fn from_pages(pages: impl IntoIterator<Item = u32>) -> Self {
        let mut pages: Vec<u32> = pages.into_iter().filter(|&p| p > 0).collect();
        pages.sort_unstable();
        pages.dedup();
        Self(pages)
    }

    /// Inclusive page range. Empty when `end < start`.
    pub fn range(start: u32, end: u32) -> Self {
        Self::from_pages(start..=end)
    }

    /// Get the pages in ascending order.
    pub fn pages(&self) -> &[u32] {
        &self.0
    }

    /// First page, if any.
    pub fn first(&self) -> Option<u32> {
        self.0.first().copied()
    }

    /// Last page, if any.
    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// Number of pages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether a page belongs to the set.
    pub fn contains(&self, page: u32) -> bool {
        self.0.binary_search(&page).is_ok()
    }

    /// Iterate over the pages.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// Keep only the pages for which `keep` returns true.
    pub fn retain(&self, mut keep: impl FnMut(u32) -> bool) -> Self {
        Self(self.0.iter().copied().filter(|&p| keep(p)).collect())
    }
}

/// How the table grid is recovered from a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Cell boundaries come from drawn ruling lines.
    Lattice,
    /// Cell boundaries come from configured x positions and text alignment.
    #[default]
    Stream,
}

/// A rectangle in PDF user space (origin bottom-left, y grows upward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl Area {
    /// Create a new area.
    pub fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// Check whether a point lies inside the area (edges included).
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.bottom && y <= self.top
    }

    pub(crate) fn bits(&self) -> [u32; 4] {
        [
            self.left.to_bits(),
            self.bottom.to_bits(),
            self.right.to_bits(),
            self.top.to_bits(),
        ]
    }
}

/// A located table: pages plus the geometry used to read them.
///
/// Regions are immutable once produced; the same region always yields the
/// same grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRegion {
    /// Document the pages belong to
    pub document_id: DocumentId,
    /// Pages carrying the table
    pub pages: PageSet,
    /// Column split positions (x coordinates, ascending)
    pub column_boundaries: Vec<f32>,
    /// Grid recovery mode
    pub mode: ExtractionMode,
    /// Optional crop applied before reading spans
    pub area: Option<Area>,
    /// Number of side-by-side copies of the column schema on each page
    pub panels: usize,
}

impl TableRegion {
    /// Create a stream-mode region with a single panel and no crop.
    pub fn new(document_id: DocumentId, pages: PageSet, column_boundaries: Vec<f32>) -> Self {
        Self {
            document_id,
            pages,
            column_boundaries,
            mode: ExtractionMode::Stream,
            area: None,
            panels: 1,
        }
    }

    /// Set the extraction mode.
    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Restrict extraction to an area of each page.
    pub fn with_area(mut self, area: Area) -> Self {
        self.area = Some(area);
        self
    }

    /// Set the number of side-by-side panels.
    pub fn with_panels(mut self, panels: usize) -> Self {
        self.panels = panels.max(1);
        self
    }

    /// Number of physical columns per page row.
    pub fn column_count(&self) -> usize {
        self.column_boundaries.len() + 1
    }

    /// Number of columns in one panel.
    pub fn panel_width(&self) -> usize {
        self.column_count() / self.panels.max(1)
    }
}

/// One row of the raw text grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    /// Cell text, left to right
    pub cells: Vec<String>,
    /// Page the row was read from
    pub page: u32,
    /// Position of the row within the region's grid
    pub index: usize,
    /// The row's cell count disagrees with the configured schema
    pub geometry_mismatch: bool,
}

impl RawRow {
    /// Create a row from its cells.
    pub fn new(cells: Vec<String>, page: u32, index: usize) -> Self {
        Self {
            cells,
            page,
            index,
            geometry_mismatch: false,
        }
    }

    /// Check if every cell is blank.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }

    /// Get a cell by column index, or an empty string when out of range.
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}
