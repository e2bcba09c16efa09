//! Immutable text snapshots.
//!
//! A [`Text`] wraps a [`ropey::Rope`]. Edits never mutate a snapshot in place:
//! [`Text::apply_edit`] clones the rope (which shares its chunks) and returns
//! a new snapshot, so readers holding the previous one keep a consistent view.
//!
//! Positions follow the LSP convention: zero-based lines, columns counted in
//! UTF-16 code units.

use crate::error::{CoreError, Result};
use ropey::{Rope, RopeSlice};
use std::ops::Range as ByteSpan;

/// Zero-based line / UTF-16 column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open position range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Returns true if `position` lies within the range (end inclusive).
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }
}

/// A single edit against a text snapshot.
///
/// `range: None` replaces the whole content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Option<Range>,
    pub new_text: String,
}

impl TextEdit {
    pub fn replace(range: Range, new_text: impl Into<String>) -> Self {
        Self {
            range: Some(range),
            new_text: new_text.into(),
        }
    }

    pub fn full(new_text: impl Into<String>) -> Self {
        Self {
            range: None,
            new_text: new_text.into(),
        }
    }
}

/// Immutable snapshot of a file's content.
///
/// # Examples
///
/// ```
/// use ddlog_core::text::{Position, Text};
///
/// let text = Text::new("import a\nrelation R(x: u32)\n");
/// let offset = text.position_to_byte(Position::new(1, 9)).unwrap();
/// assert_eq!(&text.contents()[offset..offset + 1], "R");
/// assert_eq!(text.byte_to_position(offset).unwrap(), Position::new(1, 9));
/// ```
#[derive(Clone, Default)]
pub struct Text {
    rope: Rope,
}

impl Text {
    pub fn new(content: &str) -> Self {
        Self {
            rope: Rope::from_str(content),
        }
    }

    pub fn len_bytes(&self) -> usize {
        self.rope.len_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_bytes() == 0
    }

    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// Materializes the full content. Parsing works on this string, so byte
    /// spans in syntax trees are valid offsets into the rope as well.
    pub fn contents(&self) -> String {
        self.rope.to_string()
    }

    pub fn slice(&self, span: ByteSpan<usize>) -> Result<String> {
        let max = self.rope.len_bytes();
        if span.end > max {
            return Err(CoreError::ByteOutOfBounds {
                given: span.end,
                max,
            });
        }
        if span.start > span.end {
            return Err(CoreError::InvertedRange {
                start: span.start,
                end: span.end,
            });
        }
        Ok(self.rope.byte_slice(span).to_string())
    }

    pub fn byte_to_position(&self, byte: usize) -> Result<Position> {
        let max = self.rope.len_bytes();
        if byte > max {
            return Err(CoreError::ByteOutOfBounds { given: byte, max });
        }
        let char_idx = self.rope.byte_to_char(byte);
        let line = self.rope.char_to_line(char_idx);
        let line_start = self.rope.line_to_char(line);
        let character =
            self.rope.char_to_utf16_cu(char_idx) - self.rope.char_to_utf16_cu(line_start);
        Ok(Position::new(line as u32, character as u32))
    }

    pub fn position_to_byte(&self, position: Position) -> Result<usize> {
        let char_idx = self.position_to_char(position)?;
        Ok(self.rope.char_to_byte(char_idx))
    }

    pub fn span_to_range(&self, span: ByteSpan<usize>) -> Result<Range> {
        let start = self.byte_to_position(span.start)?;
        let end = self.byte_to_position(span.end)?;
        Ok(Range::new(start, end))
    }

    /// Applies one edit, returning the new snapshot.
    pub fn apply_edit(&self, edit: &TextEdit) -> Result<Self> {
        let Some(range) = edit.range else {
            return Ok(Self::new(&edit.new_text));
        };

        let start = self.position_to_char(range.start)?;
        let end = self.position_to_char(range.end)?;
        if start > end {
            return Err(CoreError::InvertedRange { start, end });
        }

        let mut rope = self.rope.clone();
        rope.remove(start..end);
        rope.insert(start, &edit.new_text);
        Ok(Self { rope })
    }

    /// Applies edits in order; each edit's positions refer to the result of
    /// the previous one.
    pub fn apply_edits(&self, edits: &[TextEdit]) -> Result<Self> {
        let mut text = self.clone();
        for edit in edits {
            text = text.apply_edit(edit)?;
        }
        Ok(text)
    }

    fn position_to_char(&self, position: Position) -> Result<usize> {
        let line = position.line as usize;
        let lines = self.rope.len_lines();
        if line >= lines {
            return Err(CoreError::LineOutOfBounds {
                given: line,
                max: lines,
            });
        }

        let slice = self.rope.line(line);
        let max = content_len_utf16(slice);
        let column = position.character as usize;
        if column > max {
            return Err(CoreError::ColumnOutOfBounds { given: column, max });
        }

        Ok(self.rope.line_to_char(line) + slice.utf16_cu_to_char(column))
    }
}

/// UTF-16 length of a line without its line terminator.
fn content_len_utf16(line: RopeSlice<'_>) -> usize {
    let mut len = line.len_utf16_cu();
    let mut chars = line.chars_at(line.len_chars());
    if chars.prev() == Some('\n') {
        len -= 1;
        if chars.prev() == Some('\r') {
            len -= 1;
        }
    }
    len
}

impl std::fmt::Debug for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Text")
            .field("len_bytes", &self.rope.len_bytes())
            .field("len_lines", &self.rope.len_lines())
            .finish()
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.rope == other.rope
    }
}

impl Eq for Text {}

impl From<&str> for Text {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
