//! Documents assembled in memory.

use super::layout::{spans_to_text, TextSpan};
use super::{check_page, Ruling, SourceDocument};
use crate::error::Result;
use crate::model::{DocumentId, DocumentKey};

/// Default line height used by [`MemoryPage::line`].
const LINE_HEIGHT: f32 = 14.0;

/// Top baseline used by [`MemoryPage::line`].
const TOP_BASELINE: f32 = 780.0;

/// One page of a [`MemoryDocument`].
#[derive(Debug, Clone, Default)]
pub struct MemoryPage {
    spans: Vec<TextSpan>,
    rulings: Vec<Ruling>,
    text: Option<String>,
    next_line: usize,
}

impl MemoryPage {
    /// Create an empty page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a span at an explicit position.
    pub fn span(mut self, text: impl Into<String>, x: f32, y: f32) -> Self {
        self.spans.push(TextSpan::new(text, x, y, 10.0));
        self
    }

    /// Add a line of cells, each placed at its x position, on the next
    /// baseline down the page.
    pub fn line(mut self, cells: &[(f32, &str)]) -> Self {
        let y = TOP_BASELINE - self.next_line as f32 * LINE_HEIGHT;
        self.next_line += 1;
        for (x, text) in cells {
            if !text.is_empty() {
                self.spans.push(TextSpan::new(*text, *x, y, 10.0));
            }
        }
        self
    }

    /// Add a ruling line.
    pub fn ruling(mut self, ruling: Ruling) -> Self {
        self.rulings.push(ruling);
        self
    }

    /// Override the page's plain text instead of deriving it from spans.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// A [`SourceDocument`] whose pages are built in code.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    key: DocumentKey,
    pages: Vec<MemoryPage>,
}

impl MemoryDocument {
    /// Create a document with no pages.
    pub fn new(id: impl Into<DocumentId>) -> Self {
        Self {
            key: DocumentKey::unique(id),
            pages: Vec::new(),
        }
    }

    /// Create a document with `count` empty pages.
    pub fn with_blank_pages(id: impl Into<DocumentId>, count: u32) -> Self {
        Self {
            key: DocumentKey::unique(id),
            pages: vec![MemoryPage::new(); count as usize],
        }
    }

    /// Append a page.
    pub fn push_page(mut self, page: MemoryPage) -> Self {
        self.pages.push(page);
        self.rekey();
        self
    }

    /// Replace the page at a 1-indexed position, growing the document with
    /// blank pages when needed.
    pub fn set_page(mut self, number: u32, page: MemoryPage) -> Self {
        let index = number.max(1) as usize - 1;
        if self.pages.len() <= index {
            self.pages.resize(index + 1, MemoryPage::new());
        }
        self.pages[index] = page;
        self.rekey();
        self
    }

    /// Changed content must not be served from entries cached for a clone.
    fn rekey(&mut self) {
        self.key = DocumentKey::unique(self.key.id().clone());
    }

    fn page(&self, page: u32) -> Result<&MemoryPage> {
        check_page(page, self.page_count())?;
        Ok(&self.pages[page as usize - 1])
    }
}

impl SourceDocument for MemoryDocument {
    fn key(&self) -> &DocumentKey {
        &self.key
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_spans(&self, page: u32) -> Result<Vec<TextSpan>> {
        Ok(self.page(page)?.spans.clone())
    }

    fn page_text(&self, page: u32) -> Result<String> {
        let p = self.page(page)?;
        Ok(match &p.text {
            Some(text) => text.clone(),
            None => spans_to_text(&p.spans),
        })
    }

    fn page_rulings(&self, page: u32) -> Result<Vec<Ruling>> {
        Ok(self.page(page)?.rulings.clone())
    }
}
