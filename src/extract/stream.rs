//! Stream extraction: columns from configured x positions.

use crate::document::layout::group_into_lines;
use crate::document::TextSpan;
use crate::model::{Area, RawRow};

/// Keep only spans whose origin lies inside the area.
pub(crate) fn crop(spans: Vec<TextSpan>, area: Option<&Area>) -> Vec<TextSpan> {
    match area {
        Some(area) => spans
            .into_iter()
            .filter(|s| area.contains(s.x, s.y))
            .collect(),
        None => spans,
    }
}

/// Column index for a span's left edge: column `i` covers
/// `[boundaries[i-1], boundaries[i])`.
pub(crate) fn column_for(x: f32, boundaries: &[f32]) -> usize {
    boundaries.partition_point(|b| *b <= x)
}

/// Read one page into physical rows of `boundaries.len() + 1` cells,
/// top to bottom. Blank rows are skipped.
pub(crate) fn read_page(
    spans: Vec<TextSpan>,
    boundaries: &[f32],
    split_gaps: bool,
) -> Vec<Vec<String>> {
    let spans: Vec<TextSpan> = if split_gaps {
        spans.iter().flat_map(TextSpan::split_on_gaps).collect()
    } else {
        spans
    };

    let columns = boundaries.len() + 1;
    group_into_lines(&spans)
        .into_iter()
        .map(|line| {
            let mut cells = vec![String::new(); columns];
            for span in &line.spans {
                let text = span.text.trim();
                if text.is_empty() {
                    continue;
                }
                let cell = &mut cells[column_for(span.x, boundaries)];
                if !cell.is_empty() {
                    cell.push(' ');
                }
                cell.push_str(text);
            }
            cells
        })
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .collect()
}

/// Split physical rows into panel rows, all left-panel rows first.
pub(crate) fn split_panels(
    physical: Vec<Vec<String>>,
    panels: usize,
    page: u32,
    next_index: &mut usize,
) -> Vec<RawRow> {
    let panels = panels.max(1);
    let mut rows = Vec::with_capacity(physical.len() * panels);

    for panel in 0..panels {
        for cells in &physical {
            let width = cells.len() / panels;
            let part: Vec<String> = cells[panel * width..(panel + 1) * width].to_vec();
            if part.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            rows.push(RawRow::new(part, page, *next_index));
            *next_index += 1;
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32) -> TextSpan {
        TextSpan::new(text, x, y, 10.0)
    }

    #[test]
    fn test_column_for() {
        let b = [100.0, 200.0];
        assert_eq!(column_for(10.0, &b), 0);
        assert_eq!(column_for(100.0, &b), 1);
        assert_eq!(column_for(199.9, &b), 1);
        assert_eq!(column_for(500.0, &b), 2);
    }

    #[test]
    fn test_read_page_assigns_columns() {
        let spans = vec![
            span("Acme", 10.0, 700.0),
            span("Corp", 40.0, 700.0),
            span("EUR", 150.0, 700.0),
            span("1,5", 250.0, 700.0),
            span("Beta", 10.0, 680.0),
        ];
        let rows = read_page(spans, &[100.0, 200.0], false);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["Acme Corp", "EUR", "1,5"]);
        // Under-populated rows are preserved
        assert_eq!(rows[1], vec!["Beta", "", ""]);
    }

    #[test]
    fn test_read_page_splits_padded_rows() {
        let spans = vec![span("Acme Corp        EUR     1,5", 10.0, 700.0)];
        let rows = read_page(spans, &[80.0, 120.0], true);
        assert_eq!(rows[0], vec!["Acme Corp", "EUR", "1,5"]);
    }

    #[test]
    fn test_split_panels_left_first() {
        let physical = vec![
            vec!["A".into(), "1".into(), "C".into(), "3".into()],
            vec!["B".into(), "2".into(), String::new(), String::new()],
        ];
        let mut index = 0;
        let rows = split_panels(physical, 2, 7, &mut index);
        let names: Vec<&str> = rows.iter().map(|r| r.cells[0].as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(rows[2].cells, vec!["C", "3"]);
        assert_eq!(rows[2].index, 2);
        assert_eq!(rows[2].page, 7);
        assert_eq!(index, 3);
    }

    #[test]
    fn test_crop() {
        let spans = vec![span("in", 50.0, 500.0), span("out", 50.0, 780.0)];
        let area = Area::new(0.0, 100.0, 600.0, 750.0);
        let kept = crop(spans, Some(&area));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "in");
    }
}
