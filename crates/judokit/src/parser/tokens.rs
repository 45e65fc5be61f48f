//! Token types for the lexer

/// Command substitution found while lexing a word.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSubstitution {
    /// Byte span of `$(...)` or the backquoted form in the source
    pub pos: (usize, usize),
    /// Source text between the delimiters
    pub inner: String,
    /// Byte offset of `inner` in the source
    pub inner_offset: usize,
}

/// Parameter reference (`$x`, `${x}`) found while lexing a word.
#[derive(Debug, Clone, PartialEq)]
pub struct RawParameter {
    pub pos: (usize, usize),
    pub value: String,
}

/// A lexed word.
///
/// `text` has quotes removed. Characters that were protected by quoting
/// or a backslash and would otherwise be expanded are kept behind a
/// backslash, so `'$a'` lexes to `\$a`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WordToken {
    pub text: String,
    pub quoted: bool,
    pub substitutions: Vec<RawSubstitution>,
    pub parameters: Vec<RawParameter>,
}

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A word (command name, argument, reserved word candidate)
    Word(WordToken),

    /// Newline character
    Newline,

    /// Semicolon (;)
    Semicolon,

    /// Pipe (|)
    Pipe,

    /// And (&&)
    And,

    /// Or (||)
    Or,

    /// Background (&)
    Background,

    /// Redirect output (>)
    RedirectOut,

    /// Redirect output append (>>)
    RedirectAppend,

    /// Redirect input (<)
    RedirectIn,

    /// Left parenthesis (()
    LeftParen,

    /// Right parenthesis ())
    RightParen,
}

impl Token {
    /// Unquoted word text, used for reserved word checks.
    pub fn bare_word(&self) -> Option<&str> {
        match self {
            Token::Word(word) if !word.quoted && !word.text.contains('\\') => Some(&word.text),
            _ => None,
        }
    }
}
