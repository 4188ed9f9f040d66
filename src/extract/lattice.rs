//! Lattice extraction: cells from drawn ruling lines.

use crate::document::{Ruling, TextSpan};
use crate::model::Area;

/// One physical row read from a ruled grid.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LatticeRow {
    pub cells: Vec<String>,
}

/// Merge positions closer than `tolerance`, keeping their mean.
fn snap(mut positions: Vec<f32>, tolerance: f32) -> Vec<f32> {
    positions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut groups: Vec<Vec<f32>> = Vec::new();
    for p in positions {
        match groups.last_mut() {
            Some(group) if p - group[group.len() - 1] <= tolerance => group.push(p),
            _ => groups.push(vec![p]),
        }
    }
    groups
        .into_iter()
        .map(|g| g.iter().sum::<f32>() / g.len() as f32)
        .collect()
}

/// Read a page's cells from its rulings.
///
/// Returns `None` when the page does not carry a usable grid (fewer than
/// two horizontal or two vertical rulings). Each row band gets as many
/// cells as there are vertical rulings crossing it minus one, so merged
/// cells show up as short rows.
pub(crate) fn read_page(
    spans: &[TextSpan],
    rulings: &[Ruling],
    area: Option<&Area>,
    tolerance: f32,
) -> Option<Vec<LatticeRow>> {
    let inside = |r: &Ruling| {
        area.map(|a| a.contains((r.x0 + r.x1) / 2.0, (r.y0 + r.y1) / 2.0))
            .unwrap_or(true)
    };
    let verticals: Vec<&Ruling> = rulings
        .iter()
        .filter(|r| r.is_vertical() && inside(r))
        .collect();
    let horizontals: Vec<&Ruling> = rulings
        .iter()
        .filter(|r| r.is_horizontal() && inside(r))
        .collect();

    let xs = snap(verticals.iter().map(|r| r.x0).collect(), tolerance);
    let mut ys = snap(horizontals.iter().map(|r| r.y0).collect(), tolerance);
    if xs.len() < 2 || ys.len() < 2 {
        return None;
    }
    ys.reverse();

    let mut rows = Vec::new();
    for band in ys.windows(2) {
        let (top, bottom) = (band[0], band[1]);

        // Vertical edges that actually cross this band
        let edges: Vec<f32> = xs
            .iter()
            .copied()
            .filter(|&x| {
                verticals.iter().any(|v| {
                    (v.x0 - x).abs() <= tolerance
                        && v.y0 <= bottom + tolerance
                        && v.y1 >= top - tolerance
                })
            })
            .collect();
        if edges.len() < 2 {
            continue;
        }

        let mut cells = vec![String::new(); edges.len() - 1];
        let mut in_band: Vec<&TextSpan> = spans
            .iter()
            .filter(|s| s.y < top && s.y > bottom)
            .collect();
        in_band.sort_by(|a, b| {
            b.y.partial_cmp(&a.y)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
        });

        for span in in_band {
            let Some(col) = edges.windows(2).position(|e| span.x >= e[0] && span.x < e[1]) else {
                continue;
            };
            let text = span.text.trim();
            if text.is_empty() {
                continue;
            }
            if !cells[col].is_empty() {
                cells[col].push(' ');
            }
            cells[col].push_str(text);
        }

        if cells.iter().any(|c| !c.is_empty()) {
            rows.push(LatticeRow { cells });
        }
    }

    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(xs: &[f32], ys: &[f32]) -> Vec<Ruling> {
        let (y_min, y_max) = (ys[ys.len() - 1], ys[0]);
        let (x_min, x_max) = (xs[0], xs[xs.len() - 1]);
        let mut rulings: Vec<Ruling> = xs.iter().map(|&x| Ruling::vertical(x, y_min, y_max)).collect();
        rulings.extend(ys.iter().map(|&y| Ruling::horizontal(y, x_min, x_max)));
        rulings
    }

    #[test]
    fn test_snap() {
        assert_eq!(snap(vec![10.0, 10.5, 50.0, 11.0], 1.0), vec![10.5, 50.0]);
    }

    #[test]
    fn test_read_ruled_grid() {
        let rulings = grid(&[0.0, 200.0, 300.0, 400.0], &[700.0, 680.0, 660.0]);
        let spans = vec![
            TextSpan::new("Acme", 5.0, 685.0, 10.0),
            TextSpan::new("EUR", 205.0, 685.0, 10.0),
            TextSpan::new("12,5", 305.0, 685.0, 10.0),
            TextSpan::new("Beta", 5.0, 665.0, 10.0),
            TextSpan::new("USD", 205.0, 665.0, 10.0),
        ];
        let rows = read_page(&spans, &rulings, None, 1.0).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells, vec!["Acme", "EUR", "12,5"]);
        assert_eq!(rows[1].cells, vec!["Beta", "USD", ""]);
    }

    #[test]
    fn test_merged_cells_give_short_rows() {
        let mut rulings = vec![
            Ruling::vertical(0.0, 660.0, 700.0),
            Ruling::vertical(400.0, 660.0, 700.0),
            // Inner edges only cross the lower band
            Ruling::vertical(200.0, 660.0, 680.0),
            Ruling::vertical(300.0, 660.0, 680.0),
        ];
        rulings.extend([700.0, 680.0, 660.0].iter().map(|&y| Ruling::horizontal(y, 0.0, 400.0)));
        let spans = vec![
            TextSpan::new("Actions", 5.0, 685.0, 10.0),
            TextSpan::new("Acme", 5.0, 665.0, 10.0),
        ];
        let rows = read_page(&spans, &rulings, None, 1.0).unwrap();
        assert_eq!(rows[0].cells.len(), 1);
        assert_eq!(rows[1].cells.len(), 3);
    }

    #[test]
    fn test_no_rulings() {
        assert!(read_page(&[], &[], None, 1.0).is_none());
    }
}
