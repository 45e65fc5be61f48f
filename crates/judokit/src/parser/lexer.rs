//! Lexer for shell scripts
//!
//! Tokenizes input into a stream of tokens with source position tracking.
//! Offsets are absolute so nested substitutions, which are lexed from a
//! slice of the outer input, report positions in the outer source.

use super::span::Position;
use super::tokens::{RawParameter, RawSubstitution, Token, WordToken};
use crate::error::{Error, Result};

/// A token with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub start: Position,
    pub end: Position,
}

/// Lexer for shell scripts.
pub struct Lexer<'a> {
    input: &'a str,
    index: usize,
    position: Position,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self::with_offset(input, 0)
    }

    /// Create a lexer whose positions start at `offset`.
    pub fn with_offset(input: &'a str, offset: usize) -> Self {
        Self {
            input,
            index: 0,
            position: Position::at_offset(offset),
        }
    }

    /// Lex the whole input.
    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_spanned_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Get the next token with its source span.
    pub fn next_spanned_token(&mut self) -> Result<Option<SpannedToken>> {
        self.skip_blanks();
        let start = self.position;
        let Some(token) = self.next_token_inner()? else {
            return Ok(None);
        };
        Ok(Some(SpannedToken {
            token,
            start,
            end: self.position,
        }))
    }

    fn rest(&self) -> &'a str {
        &self.input[self.index..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.index += ch.len_utf8();
        self.position.advance(ch);
        Some(ch)
    }

    fn error(&self, message: &str) -> Error {
        Error::parse_at(message, self.position.line, self.position.column)
    }

    /// Skip spaces, tabs, line continuations and comments.
    fn skip_blanks(&mut self) {
        while let Some(ch) = self.peek_char() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\\' if self.peek_second() == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                '#' => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token_inner(&mut self) -> Result<Option<Token>> {
        let Some(ch) = self.peek_char() else {
            return Ok(None);
        };

        let token = match ch {
            '\n' => {
                self.advance();
                Token::Newline
            }
            ';' => {
                self.advance();
                Token::Semicolon
            }
            '|' => {
                self.advance();
                if self.peek_char() == Some('|') {
                    self.advance();
                    Token::Or
                } else {
                    Token::Pipe
                }
            }
            '&' => {
                self.advance();
                if self.peek_char() == Some('&') {
                    self.advance();
                    Token::And
                } else {
                    Token::Background
                }
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('>') {
                    self.advance();
                    Token::RedirectAppend
                } else {
                    Token::RedirectOut
                }
            }
            '<' => {
                self.advance();
                Token::RedirectIn
            }
            '(' => {
                self.advance();
                Token::LeftParen
            }
            ')' => {
                self.advance();
                Token::RightParen
            }
            _ => Token::Word(self.read_word()?),
        };
        Ok(Some(token))
    }

    fn read_word(&mut self) -> Result<WordToken> {
        let mut word = WordToken::default();

        while let Some(ch) = self.peek_char() {
            match ch {
                ' ' | '\t' | '\r' | '\n' | ';' | '|' | '&' | '<' | '>' | '(' | ')' => break,
                '\'' => self.read_single_quoted(&mut word)?,
                '"' => self.read_double_quoted(&mut word)?,
                '\\' => {
                    self.advance();
                    match self.advance() {
                        Some('\n') => {}
                        Some(c) => {
                            word.text.push('\\');
                            word.text.push(c);
                        }
                        None => word.text.push_str("\\\\"),
                    }
                }
                '$' => self.read_dollar(&mut word)?,
                '`' => self.read_backquote(&mut word)?,
                _ => {
                    word.text.push(ch);
                    self.advance();
                }
            }
        }

        Ok(word)
    }

    fn read_single_quoted(&mut self, word: &mut WordToken) -> Result<()> {
        word.quoted = true;
        self.advance();
        loop {
            match self.advance() {
                None => return Err(self.error("unterminated single quote")),
                Some('\'') => return Ok(()),
                Some(c @ ('\\' | '$' | '`')) => {
                    word.text.push('\\');
                    word.text.push(c);
                }
                Some(c) => word.text.push(c),
            }
        }
    }

    fn read_double_quoted(&mut self, word: &mut WordToken) -> Result<()> {
        word.quoted = true;
        self.advance();
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(self.error("unterminated double quote"));
            };
            match ch {
                '"' => {
                    self.advance();
                    return Ok(());
                }
                '\\' => {
                    self.advance();
                    match self.advance() {
                        None => return Err(self.error("unterminated double quote")),
                        Some('\n') => {}
                        Some('"') => word.text.push('"'),
                        Some(c @ ('$' | '`' | '\\')) => {
                            word.text.push('\\');
                            word.text.push(c);
                        }
                        Some(c) => {
                            word.text.push_str("\\\\");
                            word.text.push(c);
                        }
                    }
                }
                '$' => self.read_dollar(word)?,
                '`' => self.read_backquote(word)?,
                _ => {
                    word.text.push(ch);
                    self.advance();
                }
            }
        }
    }

    /// `$(...)`, `${...}`, `$name` and special parameters.
    fn read_dollar(&mut self, word: &mut WordToken) -> Result<()> {
        let start = self.position.offset;
        self.advance();

        match self.peek_char() {
            Some('(') => {
                self.advance();
                let inner_offset = self.position.offset;
                let inner = self.read_until_close_paren()?;
                word.text.push_str("$(");
                word.text.push_str(&inner);
                word.text.push(')');
                word.substitutions.push(RawSubstitution {
                    pos: (start, self.position.offset),
                    inner,
                    inner_offset,
                });
            }
            Some('{') => {
                let mut value = String::from("$");
                loop {
                    match self.advance() {
                        None => return Err(self.error("unterminated parameter expansion")),
                        Some('}') => {
                            value.push('}');
                            break;
                        }
                        Some(c) => value.push(c),
                    }
                }
                word.text.push_str(&value);
                word.parameters.push(RawParameter {
                    pos: (start, self.position.offset),
                    value,
                });
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut value = String::from("$");
                while let Some(c) = self.peek_char() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    value.push(c);
                    self.advance();
                }
                word.text.push_str(&value);
                word.parameters.push(RawParameter {
                    pos: (start, self.position.offset),
                    value,
                });
            }
            Some(c) if c.is_ascii_digit() || matches!(c, '@' | '*' | '#' | '?' | '$' | '!') => {
                self.advance();
                let value = format!("${}", c);
                word.text.push_str(&value);
                word.parameters.push(RawParameter {
                    pos: (start, self.position.offset),
                    value,
                });
            }
            _ => word.text.push('$'),
        }
        Ok(())
    }

    /// Backquoted substitution, stored in the word as `$(...)`.
    fn read_backquote(&mut self, word: &mut WordToken) -> Result<()> {
        let start = self.position.offset;
        self.advance();
        let inner_offset = self.position.offset;
        let mut inner = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("unterminated backquote")),
                Some('`') => break,
                Some('\\') => match self.advance() {
                    Some(c @ ('`' | '\\' | '$')) => inner.push(c),
                    Some(c) => {
                        inner.push('\\');
                        inner.push(c);
                    }
                    None => return Err(self.error("unterminated backquote")),
                },
                Some(c) => inner.push(c),
            }
        }
        word.text.push_str("$(");
        word.text.push_str(&inner);
        word.text.push(')');
        word.substitutions.push(RawSubstitution {
            pos: (start, self.position.offset),
            inner,
            inner_offset,
        });
        Ok(())
    }

    /// Read raw text up to the `)` closing an already consumed `$(`.
    fn read_until_close_paren(&mut self) -> Result<String> {
        let mut inner = String::new();
        let mut depth = 1usize;
        loop {
            let Some(ch) = self.advance() else {
                return Err(self.error("unterminated command substitution"));
            };
            match ch {
                '\\' => {
                    inner.push(ch);
                    if let Some(next) = self.advance() {
                        inner.push(next);
                    }
                    continue;
                }
                '\'' => {
                    inner.push(ch);
                    loop {
                        match self.advance() {
                            None => return Err(self.error("unterminated single quote")),
                            Some(c) => {
                                inner.push(c);
                                if c == '\'' {
                                    break;
                                }
                            }
                        }
                    }
                    continue;
                }
                '"' => {
                    inner.push(ch);
                    loop {
                        match self.advance() {
                            None => return Err(self.error("unterminated double quote")),
                            Some('\\') => {
                                inner.push('\\');
                                if let Some(c) = self.advance() {
                                    inner.push(c);
                                }
                            }
                            Some(c) => {
                                inner.push(c);
                                if c == '"' {
                                    break;
                                }
                            }
                        }
                    }
                    continue;
                }
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(inner);
                    }
                }
                _ => {}
            }
            inner.push(ch);
        }
    }
}
