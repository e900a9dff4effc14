use unicode_width::UnicodeWidthStr;

use crate::gate::LevelGate;
use crate::render::RenderedRow;
use tailscope_types::Headers;

/// Upper bound for any single column's computed width
const MAX_COLUMN_WIDTH: usize = 40;

/// Rendered rows of the active session, in arrival order
#[derive(Debug, Default)]
pub struct RowTable {
    headers: Headers,
    rows: Vec<RenderedRow>,

    /// Display widths per column, from the first visible row
    column_widths: Vec<usize>,

    /// Bumped on every structural or visibility change
    revision: u64,
}

impl RowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every row and the header list
    pub fn clear(&mut self) {
        self.headers = Headers::default();
        self.rows.clear();
        self.column_widths.clear();
        self.touch();
    }

    /// Establish the header list; ignored once set
    pub fn set_headers(&mut self, headers: Headers) -> bool {
        if !self.headers.is_empty() {
            return false;
        }
        self.column_widths = headers.columns().iter().map(|h| h.width()).collect();
        self.headers = headers;
        self.touch();
        true
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Append one row at the end
    pub fn push(&mut self, row: RenderedRow) {
        self.rows.push(row);
        self.touch();
    }

    pub fn rows(&self) -> &[RenderedRow] {
        &self.rows
    }

    /// Rows from `start` to the end, for visibility updates
    pub fn rows_from_mut(&mut self, start: usize) -> &mut [RenderedRow] {
        self.touch();
        let start = start.min(self.rows.len());
        &mut self.rows[start..]
    }

    pub fn rows_mut(&mut self) -> &mut [RenderedRow] {
        self.touch();
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mark the table changed without altering it (e.g. gate moved)
    pub fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Indices of rows passing both the filter and the gate
    pub fn visible_indices(&self, gate: &LevelGate) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_visible(gate))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn first_visible(&self, gate: &LevelGate) -> Option<&RenderedRow> {
        self.rows.iter().find(|r| r.is_visible(gate))
    }

    pub fn column_widths(&self) -> &[usize] {
        &self.column_widths
    }

    /// Size columns to the current first visible row, never narrower than the header
    pub fn recompute_widths(&mut self, gate: &LevelGate) {
        let header_widths = self.headers.columns().iter().map(|h| h.width());
        let widths: Vec<usize> = match self.first_visible(gate) {
            Some(row) => header_widths
                .enumerate()
                .map(|(i, hw)| {
                    let cw = row.cells.get(i).map(|c| c.text.width()).unwrap_or(0);
                    hw.max(cw).min(MAX_COLUMN_WIDTH)
                })
                .collect(),
            None => header_widths.collect(),
        };
        self.column_widths = widths;
    }
}
