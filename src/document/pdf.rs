//! PDF documents backed by lopdf.
//!
//! Every page's content stream is interpreted once at load time into
//! positioned text spans and ruling lines. Interpretation tracks the
//! current transformation matrix and the text matrices so coordinates end
//! up in page user space, which is where column boundaries are configured.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Document as LopdfDocument, Object, ObjectId, Stream};

use super::layout::{estimate_width, TextSpan};
use super::{check_page, Ruling, SourceDocument};
use crate::error::{Error, Result};
use crate::model::{DocumentId, DocumentKey};

/// Rectangles thinner than this (in points) are read as a single line.
const RULE_THICKNESS: f32 = 2.0;

/// TJ adjustments are expressed in thousandths of text space.
const TJ_UNITS: f32 = 1000.0;

/// Decoded content of one page.
#[derive(Debug, Clone, Default)]
struct PageContent {
    spans: Vec<TextSpan>,
    rulings: Vec<Ruling>,
}

/// A PDF report loaded into memory.
#[derive(Debug)]
pub struct PdfDocument {
    key: DocumentKey,
    pages: Vec<std::result::Result<PageContent, String>>,
}

impl PdfDocument {
    /// Load from a file path. The file name becomes the document id.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let doc = LopdfDocument::load(path)?;
        Self::from_lopdf(DocumentId::new(id), &doc)
    }

    /// Load from an in-memory byte slice.
    pub fn load_bytes(id: impl Into<DocumentId>, data: &[u8]) -> Result<Self> {
        let doc = LopdfDocument::load_mem(data)?;
        Self::from_lopdf(id.into(), &doc)
    }

    /// Load from a reader.
    pub fn load_reader<R: std::io::Read>(id: impl Into<DocumentId>, mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::load_bytes(id, &data)
    }

    /// Interpret every page of an already parsed document.
    ///
    /// A page whose content cannot be decoded does not fail the document;
    /// the error is reported when that page is requested.
    pub fn from_lopdf(id: DocumentId, doc: &LopdfDocument) -> Result<Self> {
        if doc.is_encrypted() {
            return Err(Error::Encrypted);
        }

        let page_ids = doc.get_pages();
        let mut pages = Vec::with_capacity(page_ids.len());
        for (number, page_id) in &page_ids {
            let content = PageInterpreter::new(doc, *page_id).run().map_err(|e| {
                log::warn!("{}: page {} could not be decoded: {}", id, number, e);
                e.to_string()
            });
            pages.push(content);
        }

        log::debug!("{}: loaded {} pages", id, pages.len());
        Ok(Self {
            key: DocumentKey::unique(id),
            pages,
        })
    }

    fn page(&self, page: u32) -> Result<&PageContent> {
        check_page(page, self.page_count())?;
        self.pages[page as usize - 1]
            .as_ref()
            .map_err(|msg| Error::PdfParse(format!("page {}: {}", page, msg)))
    }
}

impl SourceDocument for PdfDocument {
    fn key(&self) -> &DocumentKey {
        &self.key
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_spans(&self, page: u32) -> Result<Vec<TextSpan>> {
        Ok(self.page(page)?.spans.clone())
    }

    fn page_rulings(&self, page: u32) -> Result<Vec<Ruling>> {
        Ok(self.page(page)?.rulings.clone())
    }
}

/// Stream data, decompressed when the stream declares a filter.
fn stream_bytes(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translation(tx: f32, ty: f32) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    fn from_operands(ops: &[Object]) -> Option<Self> {
        if ops.len() < 6 {
            return None;
        }
        Some(Self {
            a: get_number(&ops[0])?,
            b: get_number(&ops[1])?,
            c: get_number(&ops[2])?,
            d: get_number(&ops[3])?,
            e: get_number(&ops[4])?,
            f: get_number(&ops[5])?,
        })
    }

    /// `self × other`
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn horizontal_scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// Content stream interpreter for one page.
struct PageInterpreter<'a> {
    doc: &'a LopdfDocument,
    page_id: ObjectId,
    fonts: BTreeMap<Vec<u8>, &'a lopdf::Dictionary>,

    ctm: Matrix,
    state_stack: Vec<Matrix>,

    text_matrix: Matrix,
    line_matrix: Matrix,
    leading: f32,
    font_name: Vec<u8>,
    font_size: f32,

    current_point: Option<(f32, f32)>,
    subpath_start: Option<(f32, f32)>,
    pending_segments: Vec<Ruling>,

    out: PageContent,
}

impl<'a> PageInterpreter<'a> {
    fn new(doc: &'a LopdfDocument, page_id: ObjectId) -> Self {
        let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
        Self {
            doc,
            page_id,
            fonts,
            ctm: Matrix::IDENTITY,
            state_stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            leading: 0.0,
            font_name: Vec::new(),
            font_size: 12.0,
            current_point: None,
            subpath_start: None,
            pending_segments: Vec::new(),
            out: PageContent::default(),
        }
    }

    fn run(mut self) -> Result<PageContent> {
        let data = self.page_content()?;
        let content =
            lopdf::content::Content::decode(&data).map_err(|e| Error::PdfParse(e.to_string()))?;

        for op in &content.operations {
            self.apply(&op.operator, &op.operands);
        }
        Ok(self.out)
    }

    /// Get the page content stream, concatenating arrays of streams.
    fn page_content(&self) -> Result<Vec<u8>> {
        let page_dict = self.doc.get_dictionary(self.page_id)?;
        let contents = page_dict.get(b"Contents")?;

        match contents {
            Object::Reference(r) => match self.doc.get_object(*r)? {
                Object::Stream(s) => Ok(stream_bytes(s)),
                _ => Err(Error::PdfParse("Invalid content stream".to_string())),
            },
            Object::Array(arr) => {
                let mut content = Vec::new();
                for obj in arr {
                    if let Object::Reference(r) = obj {
                        if let Ok(Object::Stream(s)) = self.doc.get_object(*r) {
                            content.extend_from_slice(&stream_bytes(s));
                            content.push(b' ');
                        }
                    }
                }
                Ok(content)
            }
            Object::Stream(s) => Ok(stream_bytes(s)),
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            // Graphics state
            "q" => self.state_stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.state_stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.ctm = m.then(&self.ctm);
                }
            }

            // Paths
            "m" => {
                if let Some((x, y)) = point(operands) {
                    self.current_point = Some((x, y));
                    self.subpath_start = Some((x, y));
                }
            }
            "l" => {
                if let (Some(from), Some(to)) = (self.current_point, point(operands)) {
                    self.push_segment(from, to);
                    self.current_point = Some(to);
                }
            }
            "h" => {
                if let (Some(from), Some(to)) = (self.current_point, self.subpath_start) {
                    self.push_segment(from, to);
                    self.current_point = Some(to);
                }
            }
            "re" => self.push_rectangle(operands),
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                self.out.rulings.append(&mut self.pending_segments);
                self.current_point = None;
            }
            "n" => {
                self.pending_segments.clear();
                self.current_point = None;
            }

            // Text
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if operands.len() >= 2 {
                    if let Object::Name(name) = &operands[0] {
                        self.font_name = name.clone();
                    }
                    self.font_size = get_number(&operands[1]).unwrap_or(12.0);
                }
            }
            "TL" => {
                if let Some(tl) = operands.first().and_then(get_number) {
                    self.leading = tl;
                }
            }
            "Td" => {
                if let Some((tx, ty)) = point(operands) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some((tx, ty)) = point(operands) {
                    self.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let text = self.decode(bytes);
                    self.show(text, 0.0);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_array(items);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let text = self.decode(bytes);
                    self.show(text, 0.0);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    let text = self.decode(bytes);
                    self.show(text, 0.0);
                }
            }
            _ => {}
        }
    }

    fn push_segment(&mut self, from: (f32, f32), to: (f32, f32)) {
        let (x0, y0) = self.ctm.apply(from.0, from.1);
        let (x1, y1) = self.ctm.apply(to.0, to.1);
        if let Some(ruling) = Ruling::axis_aligned(x0, y0, x1, y1) {
            self.pending_segments.push(ruling);
        }
    }

    fn push_rectangle(&mut self, operands: &[Object]) {
        let nums: Vec<f32> = operands.iter().filter_map(get_number).collect();
        if nums.len() < 4 {
            return;
        }
        let (x, y, w, h) = (nums[0], nums[1], nums[2], nums[3]);

        if h.abs() <= RULE_THICKNESS {
            let mid = y + h / 2.0;
            self.push_segment((x, mid), (x + w, mid));
        } else if w.abs() <= RULE_THICKNESS {
            let mid = x + w / 2.0;
            self.push_segment((mid, y), (mid, y + h));
        } else {
            self.push_segment((x, y), (x + w, y));
            self.push_segment((x + w, y), (x + w, y + h));
            self.push_segment((x + w, y + h), (x, y + h));
            self.push_segment((x, y + h), (x, y));
        }
        self.current_point = Some((x, y));
        self.subpath_start = Some((x, y));
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        // Producers that never set TL still expect T* to advance a line
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.move_line(0.0, -leading);
    }

    /// Decode a string operand using the current font's encoding when
    /// available.
    fn decode(&self, bytes: &[u8]) -> String {
        if let Some(font) = self.fonts.get(&self.font_name) {
            if let Ok(enc) = font.get_font_encoding(self.doc) {
                if let Ok(text) = LopdfDocument::decode_text(&enc, bytes) {
                    return text;
                }
            }
        }
        decode_text_simple(bytes)
    }

    fn show_array(&mut self, items: &[Object]) {
        let mut combined = String::new();
        let mut start_offset: Option<f32> = None;
        let mut advance = 0.0f32;

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    let text = self.decode(bytes);
                    if start_offset.is_none() && !text.trim().is_empty() {
                        start_offset = Some(advance);
                    }
                    advance += estimate_width(&text, self.font_size);
                    combined.push_str(&text);
                }
                other => {
                    if let Some(n) = get_number(other) {
                        let shift = -n / TJ_UNITS * self.font_size;
                        advance += shift;
                        // Wide negative adjustments stand in for word spaces
                        if -n > 200.0 && !combined.is_empty() && !combined.ends_with(' ') {
                            combined.push(' ');
                        }
                    }
                }
            }
        }

        let offset = start_offset.unwrap_or(0.0);
        if offset != 0.0 {
            self.text_matrix = Matrix::translation(offset, 0.0).then(&self.text_matrix);
        }
        let remaining = advance - offset - estimate_width(&combined, self.font_size);
        self.show(combined, remaining);
    }

    /// Emit a span at the current text position and advance the text matrix
    /// past it. `extra_advance` is added after the text (TJ adjustments).
    fn show(&mut self, text: String, extra_advance: f32) {
        let text_width = estimate_width(&text, self.font_size);
        let trm = self.text_matrix.then(&self.ctm);

        if !text.trim().is_empty() {
            let (x, y) = trm.apply(0.0, 0.0);
            let size = self.font_size * trm.vertical_scale();
            let width = text_width * trm.horizontal_scale();
            self.out
                .spans
                .push(TextSpan::new(text.trim_end(), x, y, size).with_width(width));
        }

        self.text_matrix =
            Matrix::translation(text_width + extra_advance, 0.0).then(&self.text_matrix);
    }
}

/// Helper to extract a number from a PDF object.
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn point(operands: &[Object]) -> Option<(f32, f32)> {
    if operands.len() < 2 {
        return None;
    }
    Some((get_number(&operands[0])?, get_number(&operands[1])?))
}

/// Simple text decoding fallback when no encoding is available.
fn decode_text_simple(bytes: &[u8]) -> String {
    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}
