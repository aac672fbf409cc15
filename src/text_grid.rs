/// Character cells per row.
pub const GRID_COLS: usize = 32;
/// Rows backed by the grid.
pub const GRID_ROWS: usize = 32;
/// Rows copied to the screen each frame.
pub const VISIBLE_ROWS: usize = 20;

/// Fixed-size text buffer mirroring BG1's 32x32 screen block.
///
/// Cells hold ASCII bytes; `0` is an empty cell. Writers never spill past the
/// end of a row and never fail: text that does not fit is dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct TextGrid {
    cells: [[u8; GRID_COLS]; GRID_ROWS],
}

impl Default for TextGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TextGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.lines()).finish()
    }
}

impl TextGrid {
    pub fn new() -> Self {
        Self {
            cells: [[0; GRID_COLS]; GRID_ROWS],
        }
    }

    pub fn clear(&mut self) {
        self.clear_from_row(0);
    }

    /// Blanks `row` and everything below it.
    pub fn clear_from_row(&mut self, row: usize) {
        for line in self.cells.iter_mut().skip(row) {
            line.fill(0);
        }
    }

    /// Writes `text` starting at (`row`, `col`), at most `max_len` cells.
    /// Returns the number of cells written.
    pub fn write(&mut self, row: usize, col: usize, text: &str, max_len: usize) -> usize {
        let Some(line) = self.cells.get_mut(row) else {
            return 0;
        };
        if col >= GRID_COLS {
            return 0;
        }
        let room = (GRID_COLS - col).min(max_len);
        let mut written = 0;
        for (cell, byte) in line[col..col + room].iter_mut().zip(text.bytes()) {
            *cell = if (0x20..0x7F).contains(&byte) { byte } else { b'?' };
            written += 1;
        }
        written
    }

    pub fn cell(&self, row: usize, col: usize) -> u8 {
        self.cells
            .get(row)
            .and_then(|line| line.get(col))
            .copied()
            .unwrap_or(0)
    }

    /// Row contents with empty cells shown as spaces, trailing blanks trimmed.
    pub fn row_text(&self, row: usize) -> String {
        let Some(line) = self.cells.get(row) else {
            return String::new();
        };
        let text: String = line
            .iter()
            .map(|&b| if b == 0 { ' ' } else { b as char })
            .collect();
        text.trim_end().to_string()
    }

    /// The visible rows as text.
    pub fn lines(&self) -> Vec<String> {
        (0..VISIBLE_ROWS).map(|row| self.row_text(row)).collect()
    }
}
