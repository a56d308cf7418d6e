//! Source-position cursor driving the parser.
//!
//! A [`Cursor`] is an immutable view into the source text at a specific
//! [`Position`]. Advancing never mutates; it returns a fresh cursor one code
//! point further along, updating row and column so every error and every AST
//! span can be reported in editor coordinates.

use serde::{Deserialize, Serialize};

/// A location in the source text.
///
/// `index` is a byte offset into the UTF-8 source and always falls on a
/// character boundary. `row` and `column` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Byte offset into the source.
    pub index: usize,
    /// 1-based line number.
    pub row: u32,
    /// 1-based column number, counted in code points.
    pub column: u32,
}

impl Position {
    /// The position of the first character of any source.
    pub fn start() -> Self {
        Self {
            index: 0,
            row: 1,
            column: 1,
        }
    }
}

/// A source range attached to every AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width span, useful for synthesized nodes in tests.
    pub fn point(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    /// The smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
        }
    }
}

/// An immutable cursor over the source text.
///
/// `Cursor` is `Copy`; combinators pass it by value and return the advanced
/// cursor alongside their output, so backtracking is simply reusing an older
/// cursor value.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'src> {
    source: &'src str,
    position: Position,
}

impl<'src> Cursor<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            position: Position::start(),
        }
    }

    /// The full source text this cursor walks.
    pub fn source(&self) -> &'src str {
        self.source
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// The remaining unconsumed input.
    pub fn rest(&self) -> &'src str {
        &self.source[self.position.index..]
    }

    /// The next code point, or `None` at end of input.
    pub fn head(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn is_end(&self) -> bool {
        self.position.index >= self.source.len()
    }

    /// A cursor one code point further along. Stepping over a line
    /// terminator moves to the next row and resets the column to 1.
    /// At end of input the cursor is returned unchanged.
    pub fn advance(&self) -> Cursor<'src> {
        let Some(ch) = self.head() else {
            return *self;
        };
        let position = if ch == '\n' {
            Position {
                index: self.position.index + ch.len_utf8(),
                row: self.position.row + 1,
                column: 1,
            }
        } else {
            Position {
                index: self.position.index + ch.len_utf8(),
                row: self.position.row,
                column: self.position.column + 1,
            }
        };
        Cursor {
            source: self.source,
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_columns() {
        let cursor = Cursor::new("ab");
        assert_eq!(cursor.head(), Some('a'));
        let next = cursor.advance();
        assert_eq!(next.head(), Some('b'));
        assert_eq!(next.position().index, 1);
        assert_eq!(next.position().row, 1);
        assert_eq!(next.position().column, 2);
    }

    #[test]
    fn advance_over_newline_moves_to_next_row() {
        let cursor = Cursor::new("a\nb");
        let at_newline = cursor.advance();
        assert_eq!(at_newline.head(), Some('\n'));
        let next_line = at_newline.advance();
        assert_eq!(next_line.head(), Some('b'));
        assert_eq!(next_line.position().row, 2);
        assert_eq!(next_line.position().column, 1);
    }

    #[test]
    fn advance_steps_whole_code_points() {
        let cursor = Cursor::new("é!");
        let next = cursor.advance();
        assert_eq!(next.head(), Some('!'));
        assert_eq!(next.position().column, 2);
    }

    #[test]
    fn advance_at_end_is_identity() {
        let cursor = Cursor::new("");
        assert!(cursor.is_end());
        assert_eq!(cursor.advance().position(), cursor.position());
    }
}
