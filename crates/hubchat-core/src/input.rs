//! Input surfaces and suggestion affordances
//!
//! The client has two text inputs bound to the same send action: the
//! "hero" input on the landing view and the "bottom" input under the
//! chat panel. Both are instances of [`InputSurface`].

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    Hero,
    Bottom,
}

impl SurfaceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SurfaceKind::Hero => "hero",
            SurfaceKind::Bottom => "bottom",
        }
    }
}

/// Maximum rows the auto-growing input may occupy
pub const MAX_INPUT_ROWS: u16 = 6;

#[derive(Debug, Clone)]
pub struct InputSurface {
    kind: SurfaceKind,
    value: String,
    cursor: usize,
    enabled: bool,
    focused: bool,
    placeholder: &'static str,
}

impl InputSurface {
    pub fn new(kind: SurfaceKind, placeholder: &'static str) -> Self {
        Self {
            kind,
            value: String::new(),
            cursor: 0,
            enabled: true,
            focused: false,
            placeholder,
        }
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cursor position in chars
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Replace the whole value, cursor at the end.
    pub fn set_value(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor = self.value.chars().count();
    }

    /// Returns false when the surface is disabled and ignored the edit.
    pub fn insert_char(&mut self, c: char) -> bool {
        if !self.enabled {
            return false;
        }
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
        true
    }

    pub fn insert_newline(&mut self) -> bool {
        self.insert_char('\n')
    }

    pub fn backspace(&mut self) -> bool {
        if !self.enabled || self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.remove(byte_pos);
        true
    }

    pub fn delete(&mut self) -> bool {
        if !self.enabled || self.cursor >= self.value.chars().count() {
            return false;
        }
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.remove(byte_pos);
        true
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        let char_count = self.value.chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    /// Rows needed to show the value at `width` columns, capped at
    /// `max_rows`. Never less than one.
    pub fn content_rows(&self, width: u16, max_rows: u16) -> u16 {
        let width = width.max(1) as usize;
        let rows: usize = self
            .value
            .split('\n')
            .map(|line| line.chars().count() / width + 1)
            .sum();
        (rows.min(max_rows as usize) as u16).max(1)
    }

    /// Row and column of the cursor when wrapped at `width` columns
    pub fn cursor_position(&self, width: u16) -> (u16, u16) {
        let width = width.max(1) as usize;
        let mut row = 0usize;
        let mut col = 0usize;
        for c in self.value.chars().take(self.cursor) {
            if c == '\n' {
                row += 1;
                col = 0;
            } else {
                col += 1;
                if col == width {
                    row += 1;
                    col = 0;
                }
            }
        }
        (row as u16, col as u16)
    }
}

/// Canned prompts offered on the landing view
pub const SUGGESTIONS: &[&str] = &[
    "What are the top airlines by number of flights?",
    "Show me the highest rated hotels",
    "Which travel packages are most popular?",
    "Summarize recent customer review sentiment",
];
