//! Table-of-contents lookup.
//!
//! Contents pages are read as a two-column grid split at
//! `TocConfig::page_column_x`: entry text on the left, printed page number
//! on the right. The fund's page range runs from its entry to the next
//! entry, shifted by the template's offsets.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::matching::{anchor_matches, fold, match_names, strip_leaders, NameMatch};
use crate::cache::{DocumentCache, TocKey};
use crate::config::{NameCleaner, TocConfig};
use crate::document::layout::group_into_lines;
use crate::document::{SourceDocument, TextLine, TextSpan};
use crate::error::Result;
use crate::model::PageSet;

/// One table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Entry text with dot leaders removed, folded
    pub title: String,
    /// Printed page number
    pub page: u32,
}

/// Read (or fetch from the cache) a document's table-of-contents entries.
pub fn read_entries(
    document: &dyn SourceDocument,
    toc: &TocConfig,
    cache: &DocumentCache,
) -> Result<Arc<Vec<TocEntry>>> {
    let key = TocKey::new(document.key(), toc);
    cache.toc_entries(key, || parse_entries(document, toc, cache))
}

fn parse_entries(
    document: &dyn SourceDocument,
    toc: &TocConfig,
    cache: &DocumentCache,
) -> Result<Vec<TocEntry>> {
    let last = toc.search_pages.min(document.page_count());
    let stop = toc.stop_entry.as_deref().map(fold);
    let mut entries = Vec::new();

    for page in 1..=last {
        let text = cache.page_text(document, page)?;
        if !anchor_matches(&toc.anchor, &text) {
            continue;
        }
        log::debug!("{}: table of contents on page {}", document.id(), page);

        let spans: Vec<TextSpan> = document
            .page_spans(page)?
            .into_iter()
            .filter(|s| toc.area.map(|a| a.contains(s.x, s.y)).unwrap_or(true))
            .collect();

        for line in group_into_lines(&spans) {
            let Some(entry) = parse_line(&line, toc.page_column_x) else {
                continue;
            };
            if let Some(stop) = &stop {
                if entry.title.contains(stop.as_str()) {
                    log::debug!("{}: contents truncated at {:?}", document.id(), entry.title);
                    return Ok(entries);
                }
            }
            entries.push(entry);
        }
    }

    Ok(entries)
}

/// Split a contents line into entry text and page number. Lines whose page
/// cell is not an integer are section headings or wrapped text and yield
/// nothing.
fn parse_line(line: &TextLine, page_column_x: f32) -> Option<TocEntry> {
    static TRAILING_PAGE: OnceLock<Regex> = OnceLock::new();

    let (left, right): (Vec<TextSpan>, Vec<TextSpan>) =
        line.spans.iter().cloned().partition(|s| s.x < page_column_x);

    let title = strip_leaders(&TextLine::from_spans(left).text());
    let page_cell = TextLine::from_spans(right).text();
    let page_cell = page_cell.trim();

    if !page_cell.is_empty() {
        let page = page_cell.parse::<u32>().ok()?;
        return (!title.is_empty()).then_some(TocEntry { title, page });
    }

    // The page number may sit inside the entry span itself
    let re = TRAILING_PAGE
        .get_or_init(|| Regex::new(r"^(.*?)\s*(\d+)$").expect("static page pattern"));
    let caps = re.captures(&title)?;
    let page = caps[2].parse::<u32>().ok()?;
    let title = caps[1].trim().to_string();
    (!title.is_empty()).then_some(TocEntry { title, page })
}

/// Find the page range of a fund from the contents entries.
///
/// Exact matches beat containment; among equal matches the first entry in
/// document order wins.
pub fn region_for(
    entries: &[TocEntry],
    target: &str,
    cleaner: &NameCleaner,
    toc: &TocConfig,
    page_count: u32,
) -> Option<PageSet> {
    let target = fold(&cleaner.apply(target));

    let mut best: Option<(usize, NameMatch)> = None;
    for (i, entry) in entries.iter().enumerate() {
        let candidate = fold(&cleaner.apply(&entry.title));
        if let Some(quality) = match_names(&target, &candidate) {
            if best.map(|(_, q)| quality > q).unwrap_or(true) {
                best = Some((i, quality));
            }
        }
    }

    let (index, quality) = best?;
    let entry = &entries[index];
    log::debug!(
        "contents entry {:?} (page {}) matched {:?} as {:?}",
        entry.title,
        entry.page,
        target,
        quality
    );

    let start = offset(entry.page, toc.start_offset).max(1);
    let end = match entries[index + 1..].iter().find(|e| e.page > entry.page) {
        Some(next) => offset(next.page, toc.end_offset),
        None => match toc.max_pages {
            Some(max) => start.saturating_add(max.saturating_sub(1)),
            None => page_count,
        },
    };
    let end = end.min(page_count).max(start);

    if start > page_count {
        return None;
    }
    Some(PageSet::range(start, end))
}

fn offset(page: u32, delta: i32) -> u32 {
    (page as i64 + delta as i64).clamp(0, u32::MAX as i64) as u32
}
