//! Page layout recovered from a timetable document.
//!
//! Both PDF and plain-text input end up as pages of lines, each line a list
//! of cells with a horizontal position. The table and free-text passes only
//! ever see this representation.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::pdf::{self, Fragment};

/// Cell separator for plain-text rows: a tab or two or more spaces.
static CELL_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t+|\s{2,}").expect("cell separator regex is valid"));

/// Column tolerance for PDF layouts, in points.
const PDF_COLUMN_TOLERANCE: f32 = 12.0;

/// Plain-text cells use their ordinal as position, so only equal positions
/// share a column.
const TEXT_COLUMN_TOLERANCE: f32 = 0.5;

/// Rough glyph advance as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;

/// A run of text at a horizontal position.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Cell {
    pub x: f32,
    pub text: String,
}

/// One visual line of a page, cells ordered left to right.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Line {
    pub cells: Vec<Cell>,
}

impl Line {
    /// Split a plain-text line into cells.
    pub fn from_text(text: &str) -> Self {
        let cells = CELL_SEPARATOR
            .split(text.trim())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, s)| Cell {
                x: i as f32,
                text: s.to_string(),
            })
            .collect();
        Self { cells }
    }

    /// The line's text, cells separated by two spaces.
    pub fn text(&self) -> String {
        self.cells
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("  ")
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// A recovered document.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    pub pages: Vec<Vec<Line>>,
    pub raw_text: String,
    /// Maximum x distance between cells of the same column.
    pub column_tolerance: f32,
}

impl Layout {
    /// Recover the layout of a document, whatever its format.
    ///
    /// Bytes that are not a loadable PDF are treated as text.
    pub fn recover(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF") {
            if let Some(layout) = pdf::load(bytes) {
                return layout;
            }
            debug!("treating PDF bytes as text");
        }
        Self::from_text(&String::from_utf8_lossy(bytes))
    }

    /// Plain-text layout: one page, one line per text line.
    pub fn from_text(text: &str) -> Self {
        let lines = text.lines().map(Line::from_text).collect();
        Self {
            pages: vec![lines],
            raw_text: text.to_string(),
            column_tolerance: TEXT_COLUMN_TOLERANCE,
        }
    }

    /// Layout of text pages extracted without positions.
    pub fn from_text_pages(pages: Vec<String>) -> Self {
        let raw_text = page_text(pages.iter().map(String::as_str));
        let pages = pages
            .iter()
            .map(|page| page.lines().map(Line::from_text).collect())
            .collect();
        Self {
            pages,
            raw_text,
            column_tolerance: TEXT_COLUMN_TOLERANCE,
        }
    }

    /// Layout of pages of positioned fragments.
    pub fn from_fragments(pages: Vec<Vec<Fragment>>) -> Self {
        let pages: Vec<Vec<Line>> = pages.into_iter().map(group_lines).collect();
        let texts: Vec<String> = pages
            .iter()
            .map(|lines| {
                lines
                    .iter()
                    .map(Line::text)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect();
        Self {
            raw_text: page_text(texts.iter().map(String::as_str)),
            pages,
            column_tolerance: PDF_COLUMN_TOLERANCE,
        }
    }
}

/// Join page texts under `--- Page N ---` headers.
fn page_text<'a>(pages: impl Iterator<Item = &'a str>) -> String {
    pages
        .enumerate()
        .map(|(i, text)| format!("--- Page {} ---\n{}", i + 1, text.trim_end()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Group positioned fragments into lines by baseline, then into cells by
/// horizontal gap.
pub(crate) fn group_lines(mut fragments: Vec<Fragment>) -> Vec<Line> {
    fragments.retain(|f| !f.text.trim().is_empty());
    // PDF y grows upwards; read top to bottom
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut rows: Vec<Vec<Fragment>> = Vec::new();
    let mut baseline = f32::NAN;
    for fragment in fragments {
        let tolerance = (fragment.size / 2.0).max(1.0);
        match rows.last_mut() {
            Some(row) if (fragment.y - baseline).abs() <= tolerance => row.push(fragment),
            _ => {
                baseline = fragment.y;
                rows.push(vec![fragment]);
            }
        }
    }

    rows.into_iter().map(cells_of_row).collect()
}

fn cells_of_row(mut row: Vec<Fragment>) -> Line {
    row.sort_by(|a, b| a.x.total_cmp(&b.x));

    let mut cells: Vec<Cell> = Vec::new();
    let mut end = f32::NEG_INFINITY;
    let mut gap_limit = 0.0;

    for fragment in row.iter().flat_map(split_wide_gaps) {
        let gap = fragment.x - end;
        match cells.last_mut() {
            Some(cell) if gap <= gap_limit => {
                if gap > fragment.size * 0.2 && !cell.text.ends_with(' ') {
                    cell.text.push(' ');
                }
                cell.text.push_str(&fragment.text);
            }
            _ => cells.push(Cell {
                x: fragment.x,
                text: fragment.text.clone(),
            }),
        }
        end = fragment.x + advance(&fragment.text, fragment.size);
        gap_limit = fragment.size;
    }

    for cell in &mut cells {
        cell.text = cell.text.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    cells.retain(|c| !c.text.is_empty());

    Line { cells }
}

/// Split a fragment whose text contains runs of spaces into separate
/// fragments at estimated positions.
fn split_wide_gaps(fragment: &Fragment) -> Vec<Fragment> {
    let mut parts = Vec::new();
    let mut offset = 0;
    let mut last = 0;
    for m in CELL_SEPARATOR.find_iter(&fragment.text) {
        parts.push((offset, &fragment.text[last..m.start()]));
        offset += fragment.text[last..m.end()].chars().count();
        last = m.end();
    }
    parts.push((offset, &fragment.text[last..]));

    parts
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(chars, text)| Fragment {
            x: fragment.x + advance_chars(chars, fragment.size),
            y: fragment.y,
            size: fragment.size,
            text: text.to_string(),
        })
        .collect()
}

pub(crate) fn advance(text: &str, size: f32) -> f32 {
    advance_chars(text.chars().count(), size)
}

fn advance_chars(chars: usize, size: f32) -> f32 {
    chars as f32 * size * GLYPH_WIDTH
}
