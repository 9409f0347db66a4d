//! PDF text recovery.
//!
//! Page content streams are interpreted just far enough to place each shown
//! string on the page. Fonts are not loaded; glyph widths are estimated from
//! the font size, which is accurate enough to tell columns apart.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use super::layout::{self, Layout};

/// A string shown at a position on the page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fragment {
    pub x: f32,
    pub y: f32,
    /// Effective font size in page units
    pub size: f32,
    pub text: String,
}

/// Load a PDF and recover its layout.
///
/// Returns `None` if the bytes do not load as a PDF with at least one page.
/// Falls back to lopdf's own text extraction, without positions, when the
/// content streams yield nothing readable (for example CID fonts without a
/// usable byte encoding).
pub(crate) fn load(bytes: &[u8]) -> Option<Layout> {
    let doc = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(error = %e, "unreadable PDF");
            return None;
        }
    };
    let pages = doc.get_pages();
    if pages.is_empty() {
        debug!("PDF has no pages");
        return None;
    }

    let mut fragments = Vec::with_capacity(pages.len());
    for (&number, &page_id) in &pages {
        match page_fragments(&doc, page_id) {
            Ok(page) => fragments.push(page),
            Err(e) => {
                debug!(page = number, error = %e, "could not interpret page content");
                fragments.push(Vec::new());
            }
        }
    }

    let layout = Layout::from_fragments(fragments);
    if has_readable_text(&layout) {
        return Some(layout);
    }

    debug!("no positioned text recovered; using plain text extraction");
    let texts = pages
        .keys()
        .map(|&number| doc.extract_text(&[number]).unwrap_or_default())
        .collect();
    Some(Layout::from_text_pages(texts))
}

fn has_readable_text(layout: &Layout) -> bool {
    layout
        .pages
        .iter()
        .flatten()
        .flat_map(|line| &line.cells)
        .any(|cell| cell.text.chars().any(char::is_alphanumeric))
}

fn page_fragments(doc: &Document, page_id: ObjectId) -> Result<Vec<Fragment>, lopdf::Error> {
    let content = Content::decode(&doc.get_page_content(page_id)?)?;

    let mut state = TextState::default();
    let mut fragments = Vec::new();
    for operation in &content.operations {
        state.apply(operation, &mut fragments);
    }
    Ok(fragments)
}

/// Affine matrix `[a b c d e f]` as used by PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translation(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`
    fn then(self, other: Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [na, nb, nc, nd, ne, nf] = other.0;
        Matrix([
            a * na + b * nc,
            a * nb + b * nd,
            c * na + d * nc,
            c * nb + d * nd,
            e * na + f * nc + ne,
            e * nb + f * nd + nf,
        ])
    }
}

/// Text state carried between operators.
#[derive(Debug, Clone)]
struct TextState {
    matrix: Matrix,
    line_matrix: Matrix,
    font_size: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            font_size: 10.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn apply(&mut self, operation: &Operation, out: &mut Vec<Fragment>) {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "BT" => {
                self.matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(number) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    self.leading = leading;
                }
            }
            "Td" => {
                if let [tx, ty] = numbers(operands)[..] {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty] = numbers(operands)[..] {
                    self.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let [a, b, c, d, e, f] = numbers(operands)[..] {
                    self.line_matrix = Matrix([a, b, c, d, e, f]);
                    self.matrix = self.line_matrix;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes, out);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes, out);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes, out);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_array(items, out);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).then(self.line_matrix);
        self.matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    /// Move along the baseline by `tx` unscaled text units.
    fn advance_by(&mut self, tx: f32) {
        self.matrix = Matrix::translation(tx, 0.0).then(self.matrix);
    }

    fn effective_size(&self) -> f32 {
        let [_, _, c, d, _, _] = self.matrix.0;
        let scale = (c * c + d * d).sqrt();
        self.font_size * if scale > 0.0 { scale } else { 1.0 }
    }

    fn fragment(&self, text: String) -> Fragment {
        let [_, _, _, _, x, y] = self.matrix.0;
        Fragment {
            x,
            y,
            size: self.effective_size(),
            text,
        }
    }

    fn show(&mut self, bytes: &[u8], out: &mut Vec<Fragment>) {
        let text = decode_text(bytes);
        out.push(self.fragment(text.clone()));
        self.advance_by(layout::advance(&text, self.font_size));
    }

    /// `TJ`: strings interleaved with position adjustments in thousandths
    /// of the font size. An adjustment wider than a glyph starts a new
    /// fragment.
    fn show_array(&mut self, items: &[Object], out: &mut Vec<Fragment>) {
        let mut pending = self.fragment(String::new());

        for item in items {
            if let Object::String(bytes, _) = item {
                let text = decode_text(bytes);
                self.advance_by(layout::advance(&text, self.font_size));
                pending.text.push_str(&text);
            } else if let Some(adjustment) = number(item) {
                let tx = -adjustment / 1000.0 * self.font_size;
                if tx > self.font_size {
                    self.advance_by(tx);
                    let next = self.fragment(String::new());
                    out.push(std::mem::replace(&mut pending, next));
                } else {
                    if tx > self.font_size * 0.2 {
                        pending.text.push(' ');
                    }
                    self.advance_by(tx);
                }
            }
        }

        out.push(pending);
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

/// Decode a PDF string: UTF-16BE with a byte-order mark, otherwise one byte
/// per character.
fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}
