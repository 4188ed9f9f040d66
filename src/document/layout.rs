//! Positioned text and line assembly.
//!
//! Spans carry PDF user-space coordinates (origin bottom-left). Lines are
//! formed by baseline proximity; text is joined with gap-based spacing.

use serde::{Deserialize, Serialize};

/// Fraction of the font size within which two baselines count as one line.
pub const LINE_TOLERANCE_FACTOR: f32 = 0.4;

/// Average glyph width as a fraction of the font size, used when a span's
/// real width is unknown.
pub const AVG_CHAR_WIDTH_FACTOR: f32 = 0.5;

/// A text span with position information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline)
    pub y: f32,
    /// Width of the text
    pub width: f32,
    /// Font size in points
    pub font_size: f32,
}

impl TextSpan {
    /// Create a new span, estimating its width from the character count.
    pub fn new(text: impl Into<String>, x: f32, y: f32, font_size: f32) -> Self {
        let text = text.into();
        let width = estimate_width(&text, font_size);
        Self {
            text,
            x,
            y,
            width,
            font_size,
        }
    }

    /// Set an explicit width.
    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Average width of one character.
    pub fn char_width(&self) -> f32 {
        let count = self.text.chars().count();
        if count > 0 && self.width > 0.0 {
            self.width / count as f32
        } else {
            self.font_size * AVG_CHAR_WIDTH_FACTOR
        }
    }

    /// Split the span wherever it contains a run of two or more whitespace
    /// characters. Producers often emit a whole table row as one string
    /// padded with spaces; the pieces get positions estimated from the
    /// character offsets.
    pub fn split_on_gaps(&self) -> Vec<TextSpan> {
        let chars: Vec<char> = self.text.chars().collect();
        let char_width = self.char_width();
        let mut pieces = Vec::new();
        let mut start: Option<usize> = None;
        let mut blank_run = 0usize;

        for (i, &c) in chars.iter().enumerate() {
            if c.is_whitespace() {
                blank_run += 1;
                if blank_run >= 2 {
                    if let Some(s) = start.take() {
                        pieces.push(self.piece(&chars, s, i + 1 - blank_run, char_width));
                    }
                }
            } else {
                if start.is_none() {
                    start = Some(i);
                }
                blank_run = 0;
            }
        }
        if let Some(s) = start {
            pieces.push(self.piece(&chars, s, chars.len(), char_width));
        }

        pieces.retain(|p| !p.text.is_empty());
        pieces
    }

    fn piece(&self, chars: &[char], start: usize, end: usize, char_width: f32) -> TextSpan {
        let text: String = chars[start..end].iter().collect::<String>().trim().to_string();
        let len = text.chars().count();
        TextSpan {
            text,
            x: self.x + start as f32 * char_width,
            y: self.y,
            width: len as f32 * char_width,
            font_size: self.font_size,
        }
    }
}

/// Estimate a text width when the font metrics are unavailable.
pub fn estimate_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * AVG_CHAR_WIDTH_FACTOR
}

/// A text line composed of spans on the same baseline.
#[derive(Debug, Clone)]
pub struct TextLine {
    /// The spans in this line, sorted by X position
    pub spans: Vec<TextSpan>,
    /// Y position (average baseline)
    pub y: f32,
}

impl TextLine {
    /// Create a line from spans, sorting them left to right.
    pub fn from_spans(mut spans: Vec<TextSpan>) -> Self {
        spans.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
        let y = if spans.is_empty() {
            0.0
        } else {
            spans.iter().map(|s| s.y).sum::<f32>() / spans.len() as f32
        };
        Self { spans, y }
    }

    /// Get the combined text of all spans with appropriate spacing.
    ///
    /// A space is inserted when the gap between spans exceeds a fifth of a
    /// character width, except between characters of scripts written
    /// without word spaces.
    pub fn text(&self) -> String {
        let mut result = String::new();

        for (i, span) in self.spans.iter().enumerate() {
            if i == 0 {
                result.push_str(&span.text);
                continue;
            }

            let prev = &self.spans[i - 1];
            let gap = span.x - prev.right();
            let space_threshold = span.char_width() * 0.2;

            let spaceless = prev
                .text
                .chars()
                .last()
                .map(is_spaceless_script_char)
                .unwrap_or(false)
                && span
                    .text
                    .chars()
                    .next()
                    .map(is_spaceless_script_char)
                    .unwrap_or(false);

            let has_space = prev.text.ends_with([' ', '\u{00A0}'])
                || span.text.starts_with([' ', '\u{00A0}']);

            if gap > space_threshold && !spaceless && !has_space {
                result.push(' ');
            }
            result.push_str(&span.text);
        }

        result
    }
}

/// Group spans into lines, top of the page first.
///
/// Spans are sorted by baseline (descending) then x; a span joins the
/// current line while its baseline stays within
/// `font_size * LINE_TOLERANCE_FACTOR` of the line's first baseline.
pub fn group_into_lines(spans: &[TextSpan]) -> Vec<TextLine> {
    if spans.is_empty() {
        return vec![];
    }

    let mut sorted = spans.to_vec();
    sorted.sort_by(|a, b| {
        let y_cmp = b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal);
        if y_cmp == std::cmp::Ordering::Equal {
            a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            y_cmp
        }
    });

    let mut lines = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();
    let mut current_y: Option<f32> = None;

    for span in sorted {
        let tolerance = span.font_size.max(1.0) * LINE_TOLERANCE_FACTOR;
        match current_y {
            Some(y) if (span.y - y).abs() <= tolerance => current.push(span),
            _ => {
                if !current.is_empty() {
                    lines.push(TextLine::from_spans(std::mem::take(&mut current)));
                }
                current_y = Some(span.y);
                current.push(span);
            }
        }
    }

    if !current.is_empty() {
        lines.push(TextLine::from_spans(current));
    }

    lines
}

/// Render spans as plain text, one line per baseline.
pub fn spans_to_text(spans: &[TextSpan]) -> String {
    group_into_lines(spans)
        .iter()
        .map(TextLine::text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check if character is from a script that doesn't use word spaces.
/// Chinese and Japanese don't use spaces between words, but Korean does.
pub(crate) fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and Extension A
    (0x4E00..=0x9FFF).contains(&code)
    || (0x3400..=0x4DBF).contains(&code)
    // Extensions B-F
    || (0x20000..=0x2EBEF).contains(&code)
    // Hiragana, Katakana
    || (0x3040..=0x30FF).contains(&code)
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32) -> TextSpan {
        TextSpan::new(text, x, y, 10.0)
    }

    #[test]
    fn test_estimated_width() {
        let s = span("abcd", 0.0, 0.0);
        assert_eq!(s.width, 20.0);
        assert_eq!(s.right(), 20.0);
        assert_eq!(s.char_width(), 5.0);
    }

    #[test]
    fn test_group_into_lines() {
        let spans = vec![
            span("B", 100.0, 700.0),
            span("A", 10.0, 701.0),
            span("C", 10.0, 680.0),
        ];
        let lines = group_into_lines(&spans);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].spans[0].text, "A");
        assert_eq!(lines[0].spans[1].text, "B");
        assert_eq!(lines[1].spans[0].text, "C");
    }

    #[test]
    fn test_line_text_spacing() {
        let line = TextLine::from_spans(vec![span("Holdings", 10.0, 0.0), span("Table", 60.0, 0.0)]);
        assert_eq!(line.text(), "Holdings Table");

        // Adjacent spans (no gap) are glued together
        let line = TextLine::from_spans(vec![span("Hold", 10.0, 0.0), span("ings", 30.0, 0.0)]);
        assert_eq!(line.text(), "Holdings");
    }

    #[test]
    fn test_line_text_cjk_no_space() {
        let line = TextLine::from_spans(vec![span("日本", 0.0, 0.0), span("語", 40.0, 0.0)]);
        assert_eq!(line.text(), "日本語");
    }

    #[test]
    fn test_spans_to_text() {
        let spans = vec![span("second", 10.0, 680.0), span("first", 10.0, 700.0)];
        assert_eq!(spans_to_text(&spans), "first\nsecond");
    }

    #[test]
    fn test_split_on_gaps() {
        let s = span("Acme Corp   EUR   1 234,56", 100.0, 500.0);
        let pieces = s.split_on_gaps();
        let texts: Vec<&str> = pieces.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["Acme Corp", "EUR", "1 234,56"]);
        assert_eq!(pieces[0].x, 100.0);
        // "EUR" starts at character 12
        assert_eq!(pieces[1].x, 100.0 + 12.0 * 5.0);
    }

    #[test]
    fn test_split_on_gaps_single_spaces_kept() {
        let s = span("Acme Holdings Ltd", 0.0, 0.0);
        let pieces = s.split_on_gaps();
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].text, "Acme Holdings Ltd");
    }
}
