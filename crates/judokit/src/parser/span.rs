//! Source location tracking for parse errors and node positions

/// A position in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// 1-based line number
    pub line: usize,
    /// 1-based column number
    pub column: usize,
    /// 0-based byte offset from the start of the outermost input
    pub offset: usize,
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

impl Position {
    /// Position at line 1, column 1, offset 0.
    pub fn new() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    /// Position at a byte offset, used when lexing nested substitutions.
    pub fn at_offset(offset: usize) -> Self {
        Self {
            offset,
            ..Self::new()
        }
    }

    /// Advance position by one character.
    pub fn advance(&mut self, ch: char) {
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_advance() {
        let mut pos = Position::new();
        pos.advance('a');
        assert_eq!((pos.line, pos.column, pos.offset), (1, 2, 1));

        pos.advance('\n');
        assert_eq!((pos.line, pos.column, pos.offset), (2, 1, 2));

        pos.advance('é');
        assert_eq!(pos.offset, 4);
    }

    #[test]
    fn test_at_offset() {
        let pos = Position::at_offset(7);
        assert_eq!(pos.offset, 7);
        assert_eq!(pos.to_string(), "1:1");
    }
}
