//! Virtual screen buffer for embedded terminal sessions
//!
//! Interprets the byte stream coming out of a session's pty into a grid of
//! styled cells. The grid is mutated only on the render thread; reader tasks
//! hand raw bytes over and never touch it. Supports the escape sequences an
//! interactive shell actually emits:
//! - SGR (16-color, 256-color, 24-bit RGB, text attributes)
//! - Cursor positioning and relative movement
//! - Erase in line / erase in display
//! - Line feed, carriage return, tab, backspace

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use vte::{Params, Perform};

/// Tab stops every 8 columns, the terminal default
const TAB_WIDTH: usize = 8;

/// Convert a u16 escape parameter to u8, clamping to the valid color range
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Intentional: clamped to 0-255
const fn to_color_u8(value: u16) -> u8 {
    if value > 255 {
        255
    } else {
        value as u8
    }
}

/// A single character cell with its display attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: Style::default().fg(Color::Reset).bg(Color::Reset),
        }
    }
}

/// Grid of cells a session renders into, plus cursor state
pub struct Screen {
    cols: usize,
    rows: usize,
    cells: Vec<Cell>,
    cursor_row: usize,
    cursor_col: usize,
    saved_cursor: (usize, usize),
    /// Style applied to the next printed character
    current_style: Style,
}

impl Screen {
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        let cols = cols.max(1) as usize;
        let rows = rows.max(1) as usize;
        Self {
            cols,
            rows,
            cells: vec![Cell::default(); cols * rows],
            cursor_row: 0,
            cursor_col: 0,
            saved_cursor: (0, 0),
            current_style: Style::default().fg(Color::Reset).bg(Color::Reset),
        }
    }

    /// Resize the grid, preserving the top-left content. Idempotent: a
    /// resize to the current geometry is a no-op, so callers can invoke it
    /// on every render pass.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let cols = cols.max(1) as usize;
        let rows = rows.max(1) as usize;
        if cols == self.cols && rows == self.rows {
            return;
        }

        let mut cells = vec![Cell::default(); cols * rows];
        for row in 0..rows.min(self.rows) {
            for col in 0..cols.min(self.cols) {
                cells[row * cols + col] = self.cells[row * self.cols + col];
            }
        }

        self.cells = cells;
        self.cols = cols;
        self.rows = rows;
        self.cursor_row = self.cursor_row.min(rows - 1);
        self.cursor_col = self.cursor_col.min(cols - 1);
    }

    /// Current cursor position as (col, row)
    #[must_use]
    pub fn cursor(&self) -> (u16, u16) {
        #[allow(clippy::cast_possible_truncation)] // Grid dims come from u16
        (self.cursor_col as u16, self.cursor_row as u16)
    }

    #[must_use]
    pub fn size(&self) -> (u16, u16) {
        #[allow(clippy::cast_possible_truncation)]
        (self.cols as u16, self.rows as u16)
    }

    /// Render the grid as styled lines, merging runs of identically styled
    /// cells into single spans.
    #[must_use]
    pub fn lines(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::with_capacity(self.rows);

        for row in 0..self.rows {
            let mut spans: Vec<Span<'static>> = Vec::new();
            let mut run = String::new();
            let mut run_style = self.cells[row * self.cols].style;

            for col in 0..self.cols {
                let cell = self.cells[row * self.cols + col];
                if cell.style != run_style {
                    if !run.is_empty() {
                        spans.push(Span::styled(std::mem::take(&mut run), run_style));
                    }
                    run_style = cell.style;
                }
                run.push(cell.ch);
            }
            if !run.is_empty() {
                spans.push(Span::styled(run, run_style));
            }

            lines.push(Line::from(spans));
        }

        lines
    }

    /// Plain-text contents of one row, trailing blanks trimmed. Test helper.
    #[cfg(test)]
    #[must_use]
    pub fn row_text(&self, row: usize) -> String {
        let mut text: String = (0..self.cols)
            .map(|col| self.cells[row * self.cols + col].ch)
            .collect();
        while text.ends_with(' ') {
            text.pop();
        }
        text
    }

    fn put_char(&mut self, c: char) {
        if self.cursor_col >= self.cols {
            self.cursor_col = 0;
            self.line_feed();
        }
        self.cells[self.cursor_row * self.cols + self.cursor_col] = Cell {
            ch: c,
            style: self.current_style,
        };
        self.cursor_col += 1;
    }

    fn line_feed(&mut self) {
        if self.cursor_row + 1 >= self.rows {
            self.scroll_up();
        } else {
            self.cursor_row += 1;
        }
    }

    /// Drop the top row and add a blank row at the bottom
    fn scroll_up(&mut self) {
        self.cells.drain(..self.cols);
        self.cells
            .extend(std::iter::repeat(Cell::default()).take(self.cols));
    }

    fn erase_cell(&mut self, row: usize, col: usize) {
        self.cells[row * self.cols + col] = Cell::default();
    }

    fn erase_in_line(&mut self, mode: u16) {
        let row = self.cursor_row;
        match mode {
            // Cursor to end of line (default)
            0 => {
                for col in self.cursor_col..self.cols {
                    self.erase_cell(row, col);
                }
            }
            // Start of line to cursor
            1 => {
                for col in 0..=self.cursor_col.min(self.cols - 1) {
                    self.erase_cell(row, col);
                }
            }
            // Entire line
            2 => {
                for col in 0..self.cols {
                    self.erase_cell(row, col);
                }
            }
            _ => {}
        }
    }

    fn erase_in_display(&mut self, mode: u16) {
        match mode {
            // Cursor to end of display (default)
            0 => {
                self.erase_in_line(0);
                for row in (self.cursor_row + 1)..self.rows {
                    for col in 0..self.cols {
                        self.erase_cell(row, col);
                    }
                }
            }
            // Start of display to cursor
            1 => {
                for row in 0..self.cursor_row {
                    for col in 0..self.cols {
                        self.erase_cell(row, col);
                    }
                }
                self.erase_in_line(1);
            }
            // Entire display (3 also clears scrollback, which we don't keep)
            2 | 3 => {
                self.cells.fill(Cell::default());
            }
            _ => {}
        }
    }

    /// Map a standard ANSI color index (0-15) to a ratatui color
    fn ansi_color(index: u8) -> Color {
        match index {
            0 => Color::Black,
            1 => Color::Red,
            2 => Color::Green,
            3 => Color::Yellow,
            4 => Color::Blue,
            5 => Color::Magenta,
            6 => Color::Cyan,
            7 => Color::White,
            8 => Color::DarkGray,
            9 => Color::LightRed,
            10 => Color::LightGreen,
            11 => Color::LightYellow,
            12 => Color::LightBlue,
            13 => Color::LightMagenta,
            14 => Color::LightCyan,
            _ => Color::White,
        }
    }

    /// Parse an extended color sub-sequence (SGR 38/48): either `5;n` for
    /// the 256-color palette or `2;r;g;b` for 24-bit RGB.
    fn extended_color(iter: &mut vte::ParamsIter<'_>) -> Option<Color> {
        let mode = iter.next().and_then(|p| p.first().copied())?;
        match mode {
            5 => {
                let index = iter.next().and_then(|p| p.first().copied())?;
                Some(Color::Indexed(to_color_u8(index)))
            }
            2 => {
                let r = iter.next().and_then(|p| p.first().copied())?;
                let g = iter.next().and_then(|p| p.first().copied())?;
                let b = iter.next().and_then(|p| p.first().copied())?;
                Some(Color::Rgb(to_color_u8(r), to_color_u8(g), to_color_u8(b)))
            }
            _ => None,
        }
    }

    fn handle_sgr(&mut self, params: &Params) {
        if params.is_empty() {
            self.current_style = Style::default().fg(Color::Reset).bg(Color::Reset);
            return;
        }

        let mut iter = params.iter();
        while let Some(param) = iter.next() {
            let Some(&code) = param.first() else { continue };

            match code {
                0 => {
                    self.current_style = Style::default().fg(Color::Reset).bg(Color::Reset);
                }
                1 => self.current_style = self.current_style.add_modifier(Modifier::BOLD),
                2 => self.current_style = self.current_style.add_modifier(Modifier::DIM),
                3 => self.current_style = self.current_style.add_modifier(Modifier::ITALIC),
                4 => self.current_style = self.current_style.add_modifier(Modifier::UNDERLINED),
                5 => self.current_style = self.current_style.add_modifier(Modifier::SLOW_BLINK),
                7 => self.current_style = self.current_style.add_modifier(Modifier::REVERSED),
                9 => self.current_style = self.current_style.add_modifier(Modifier::CROSSED_OUT),
                22 => {
                    self.current_style = self
                        .current_style
                        .remove_modifier(Modifier::BOLD)
                        .remove_modifier(Modifier::DIM);
                }
                23 => self.current_style = self.current_style.remove_modifier(Modifier::ITALIC),
                24 => {
                    self.current_style = self.current_style.remove_modifier(Modifier::UNDERLINED);
                }
                25 => {
                    self.current_style = self.current_style.remove_modifier(Modifier::SLOW_BLINK);
                }
                27 => self.current_style = self.current_style.remove_modifier(Modifier::REVERSED),
                29 => {
                    self.current_style = self.current_style.remove_modifier(Modifier::CROSSED_OUT);
                }
                30..=37 => {
                    self.current_style =
                        self.current_style.fg(Self::ansi_color(to_color_u8(code - 30)));
                }
                38 => {
                    if let Some(color) = Self::extended_color(&mut iter) {
                        self.current_style = self.current_style.fg(color);
                    }
                }
                39 => self.current_style = self.current_style.fg(Color::Reset),
                40..=47 => {
                    self.current_style =
                        self.current_style.bg(Self::ansi_color(to_color_u8(code - 40)));
                }
                48 => {
                    if let Some(color) = Self::extended_color(&mut iter) {
                        self.current_style = self.current_style.bg(color);
                    }
                }
                49 => self.current_style = self.current_style.bg(Color::Reset),
                90..=97 => {
                    self.current_style = self
                        .current_style
                        .fg(Self::ansi_color(to_color_u8(code - 90 + 8)));
                }
                100..=107 => {
                    self.current_style = self
                        .current_style
                        .bg(Self::ansi_color(to_color_u8(code - 100 + 8)));
                }
                _ => {}
            }
        }
    }
}

impl Perform for Screen {
    fn print(&mut self, c: char) {
        self.put_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.line_feed(),
            b'\r' => self.cursor_col = 0,
            b'\t' => {
                let next_stop = (self.cursor_col / TAB_WIDTH + 1) * TAB_WIDTH;
                self.cursor_col = next_stop.min(self.cols - 1);
            }
            // Backspace moves the cursor; it does not erase
            0x08 => self.cursor_col = self.cursor_col.saturating_sub(1),
            // Bell - ignore
            0x07 => {}
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {
        // Window title updates and similar - the tab keeps its own title
    }

    fn csi_dispatch(
        &mut self,
        params: &Params,
        _intermediates: &[u8],
        _ignore: bool,
        action: char,
    ) {
        let param = |n: usize| -> u16 {
            params
                .iter()
                .nth(n)
                .and_then(|p| p.first().copied())
                .unwrap_or(0)
        };

        match action {
            'm' => self.handle_sgr(params),
            // Cursor position (1-based row;col)
            'H' | 'f' => {
                let row = (param(0).max(1) as usize - 1).min(self.rows - 1);
                let col = (param(1).max(1) as usize - 1).min(self.cols - 1);
                self.cursor_row = row;
                self.cursor_col = col;
            }
            'A' => {
                self.cursor_row = self.cursor_row.saturating_sub(param(0).max(1) as usize);
            }
            'B' => {
                self.cursor_row =
                    (self.cursor_row + param(0).max(1) as usize).min(self.rows - 1);
            }
            'C' => {
                self.cursor_col =
                    (self.cursor_col + param(0).max(1) as usize).min(self.cols - 1);
            }
            'D' => {
                self.cursor_col = self.cursor_col.saturating_sub(param(0).max(1) as usize);
            }
            // Cursor horizontal absolute (1-based)
            'G' => {
                self.cursor_col = (param(0).max(1) as usize - 1).min(self.cols - 1);
            }
            'J' => self.erase_in_display(param(0)),
            'K' => self.erase_in_line(param(0)),
            's' => self.saved_cursor = (self.cursor_row, self.cursor_col),
            'u' => {
                let (row, col) = self.saved_cursor;
                self.cursor_row = row.min(self.rows - 1);
                self.cursor_col = col.min(self.cols - 1);
            }
            _ => {}
        }
    }
}
