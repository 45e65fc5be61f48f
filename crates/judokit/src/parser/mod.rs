//! Parser module for Judokit
//!
//! Recursive descent parser producing the [`Node`] tree the interpreter
//! compiles. Positions are byte offsets into the source; command
//! substitutions are parsed recursively with positions in the outer source.

mod ast;
mod lexer;
mod span;
mod tokens;

pub use ast::{IfClause, Node, Pos, RedirectKind, quote_word};
pub(crate) use ast::matching_paren;
use lexer::Lexer;
use span::Position;

use crate::error::{Error, Result};
use lexer::SpannedToken;
use tokens::{Token, WordToken};

/// Words that close a nested command list.
const LIST_TERMINATORS: &[&str] = &["}", "done", "fi", "then", "elif", "else", "do"];

/// Parse a script into top-level nodes, one per complete command line.
///
/// ```
/// let nodes = judokit::parse("a=1; echo $a\nls | wc").unwrap();
/// assert_eq!(nodes.len(), 2);
/// assert_eq!(nodes[0].kind(), "list");
/// assert_eq!(nodes[1].kind(), "pipeline");
/// ```
pub fn parse(input: &str) -> Result<Vec<Node>> {
    Parser::new(input)?.parse()
}

/// Parser for shell scripts.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    index: usize,
    end: Position,
}

impl Parser {
    /// Create a new parser for the given input.
    pub fn new(input: &str) -> Result<Self> {
        Self::with_offset(input, 0)
    }

    /// Create a parser for a fragment located at `offset` in a larger source.
    pub fn with_offset(input: &str, offset: usize) -> Result<Self> {
        let tokens = Lexer::with_offset(input, offset).tokenize()?;
        let end = tokens.last().map(|t| t.end).unwrap_or_else(|| Position::at_offset(offset));
        Ok(Self {
            tokens,
            index: 0,
            end,
        })
    }

    /// Parse the input and return the top-level nodes.
    pub fn parse(mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            self.skip_newlines();
            if self.at_end() {
                break;
            }
            nodes.push(self.parse_list(true)?);
            if let Some(token) = self.current() {
                if *token != Token::Newline {
                    return Err(self.unexpected());
                }
            }
        }
        Ok(nodes)
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|t| &t.token)
    }

    fn peek(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.index + ahead).map(|t| &t.token)
    }

    fn at_end(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn start_offset(&self) -> usize {
        self.tokens
            .get(self.index)
            .map(|t| t.start.offset)
            .unwrap_or(self.end.offset)
    }

    fn previous_end(&self) -> usize {
        self.index
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.end.offset)
            .unwrap_or(self.end.offset)
    }

    fn current_span(&self) -> Pos {
        self.tokens
            .get(self.index)
            .map(|t| (t.start.offset, t.end.offset))
            .unwrap_or((self.end.offset, self.end.offset))
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let position = self
            .tokens
            .get(self.index)
            .map(|t| t.start)
            .unwrap_or(self.end);
        Error::parse_at(message, position.line, position.column)
    }

    fn unexpected(&self) -> Error {
        match self.current() {
            Some(token) => self.error(format!("unexpected token {}", describe(token))),
            None => self.error("unexpected end of input"),
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.current(), Some(Token::Newline)) {
            self.advance();
        }
    }

    fn at_bare_word(&self, word: &str) -> bool {
        self.current().and_then(Token::bare_word) == Some(word)
    }

    fn at_list_terminator(&self) -> bool {
        match self.current() {
            None | Some(Token::RightParen) => true,
            Some(token) => token
                .bare_word()
                .is_some_and(|w| LIST_TERMINATORS.contains(&w)),
        }
    }

    fn expect_bare_word(&mut self, word: &str) -> Result<Pos> {
        if !self.at_bare_word(word) {
            return Err(self.error(format!("expected '{}'", word)));
        }
        let span = self.current_span();
        self.advance();
        Ok(span)
    }

    /// Parse a list of and-or items.
    ///
    /// At top level a newline ends the list. Nested lists (compound bodies,
    /// conditions) run until a terminator and keep newlines as operators.
    fn parse_list(&mut self, top_level: bool) -> Result<Node> {
        let mut parts = Vec::new();

        loop {
            if !top_level {
                self.skip_newlines();
                if self.at_list_terminator() {
                    break;
                }
            }
            parts.extend(self.parse_and_or()?);

            let op_span = self.current_span();
            match self.current() {
                Some(Token::Semicolon) => {
                    self.advance();
                    parts.push(operator(";", op_span));
                }
                Some(Token::Background) => {
                    self.advance();
                    parts.push(operator("&", op_span));
                }
                Some(Token::Newline) if !top_level => {
                    self.advance();
                    self.skip_newlines();
                    parts.push(operator("\n", op_span));
                }
                _ => break,
            }

            if top_level && matches!(self.current(), None | Some(Token::Newline)) {
                break;
            }
        }

        while matches!(parts.last(), Some(Node::Operator { op, .. }) if op == ";" || op == "\n") {
            parts.pop();
        }

        match parts.len() {
            0 => Err(self.error("expected command")),
            1 => Ok(parts.remove(0)),
            _ => Ok(Node::List {
                pos: span_of(&parts),
                parts,
            }),
        }
    }

    /// Pipelines joined by `&&` and `||`, flattened into list parts.
    fn parse_and_or(&mut self) -> Result<Vec<Node>> {
        let mut parts = vec![self.parse_pipeline()?];
        loop {
            let op = match self.current() {
                Some(Token::And) => "&&",
                Some(Token::Or) => "||",
                _ => break,
            };
            parts.push(operator(op, self.current_span()));
            self.advance();
            self.skip_newlines();
            parts.push(self.parse_pipeline()?);
        }
        Ok(parts)
    }

    fn parse_pipeline(&mut self) -> Result<Node> {
        let mut parts = vec![self.parse_command()?];
        while matches!(self.current(), Some(Token::Pipe)) {
            parts.push(Node::Pipe {
                pipe: "|".to_string(),
                pos: self.current_span(),
            });
            self.advance();
            self.skip_newlines();
            parts.push(self.parse_command()?);
        }

        if parts.len() == 1 {
            Ok(parts.remove(0))
        } else {
            Ok(Node::Pipeline {
                pos: span_of(&parts),
                parts,
            })
        }
    }

    fn parse_command(&mut self) -> Result<Node> {
        match self.current() {
            Some(Token::LeftParen) => self.parse_compound("(", ")"),
            Some(token) => match token.bare_word() {
                Some("{") => self.parse_compound("{", "}"),
                Some("if") => self.parse_if(),
                Some("for") => self.parse_for(),
                Some("function") => self.parse_function(),
                Some(_)
                    if matches!(self.peek(1), Some(Token::LeftParen))
                        && matches!(self.peek(2), Some(Token::RightParen)) =>
                {
                    self.parse_function()
                }
                _ => self.parse_simple_command(),
            },
            None => Err(self.error("expected command")),
        }
    }

    fn parse_simple_command(&mut self) -> Result<Node> {
        let start = self.start_offset();
        let mut parts = Vec::new();
        let mut seen_word = false;

        loop {
            let span = self.current_span();
            match self.current() {
                Some(Token::Word(word)) => {
                    let word = word.clone();
                    self.advance();
                    if !seen_word && is_assignment(&word) {
                        parts.push(assignment_node(word, span)?);
                    } else {
                        seen_word = true;
                        parts.push(word_node(word, span)?);
                    }
                }
                Some(Token::RedirectOut | Token::RedirectAppend | Token::RedirectIn) => {
                    parts.push(self.parse_redirect()?);
                }
                _ => break,
            }
        }

        if parts.is_empty() {
            return Err(self.unexpected());
        }
        Ok(Node::Command {
            parts,
            pos: (start, self.previous_end()),
        })
    }

    fn parse_redirect(&mut self) -> Result<Node> {
        let start = self.start_offset();
        let kind = match self.current() {
            Some(Token::RedirectOut) => RedirectKind::Output,
            Some(Token::RedirectAppend) => RedirectKind::Append,
            Some(Token::RedirectIn) => RedirectKind::Input,
            _ => return Err(self.unexpected()),
        };
        self.advance();

        let span = self.current_span();
        let Some(Token::Word(word)) = self.current() else {
            return Err(self.error("expected file name after redirect"));
        };
        let output = word_node(word.clone(), span)?;
        self.advance();

        Ok(Node::Redirect {
            kind,
            output: Box::new(output),
            pos: (start, span.1),
        })
    }

    fn parse_redirects(&mut self) -> Result<Vec<Node>> {
        let mut redirects = Vec::new();
        while matches!(
            self.current(),
            Some(Token::RedirectOut | Token::RedirectAppend | Token::RedirectIn)
        ) {
            redirects.push(self.parse_redirect()?);
        }
        Ok(redirects)
    }

    /// `( list )` or `{ list; }`
    fn parse_compound(&mut self, open: &str, close: &str) -> Result<Node> {
        let open_span = self.current_span();
        self.advance();

        let body = self.parse_list(false)?;

        let close_span = self.current_span();
        let closed = if close == ")" {
            matches!(self.current(), Some(Token::RightParen))
        } else {
            self.at_bare_word(close)
        };
        if !closed {
            return Err(self.error(format!("expected '{}'", close)));
        }
        self.advance();

        let redirects = self.parse_redirects()?;
        Ok(Node::Compound {
            list: vec![reserved(open, open_span), body, reserved(close, close_span)],
            redirects,
            pos: (open_span.0, self.previous_end()),
        })
    }

    fn parse_for(&mut self) -> Result<Node> {
        let start = self.expect_bare_word("for")?.0;

        let name = match self.current().and_then(Token::bare_word) {
            Some(name) if is_name(name) => name.to_string(),
            _ => return Err(self.error("expected loop variable name")),
        };
        self.advance();
        self.skip_newlines();

        let items = if self.at_bare_word("in") {
            self.advance();
            let mut items = Vec::new();
            while let Some(Token::Word(word)) = self.current() {
                let word = word.clone();
                let span = self.current_span();
                self.advance();
                items.push(word_node(word, span)?);
            }
            items
        } else {
            let span = self.current_span();
            vec![Node::Word {
                word: "$@".to_string(),
                parts: vec![Node::Parameter {
                    value: "$@".to_string(),
                    pos: span,
                }],
                quoted: true,
                pos: span,
            }]
        };

        while matches!(self.current(), Some(Token::Semicolon | Token::Newline)) {
            self.advance();
        }
        self.expect_bare_word("do")?;
        let body = self.parse_list(false)?;
        let end = self.expect_bare_word("done")?.1;

        Ok(Node::For {
            name,
            items,
            body: Box::new(body),
            pos: (start, end),
        })
    }

    fn parse_if(&mut self) -> Result<Node> {
        let start = self.expect_bare_word("if")?.0;
        let mut clauses = Vec::new();
        let mut keyword = "if";

        loop {
            let condition = self.parse_list(false)?;
            self.expect_bare_word("then")?;
            let body = self.parse_list(false)?;
            clauses.push(IfClause {
                keyword: keyword.to_string(),
                condition: Some(Box::new(condition)),
                body: Box::new(body),
            });

            if self.at_bare_word("elif") {
                self.advance();
                keyword = "elif";
                continue;
            }
            if self.at_bare_word("else") {
                self.advance();
                let body = self.parse_list(false)?;
                clauses.push(IfClause {
                    keyword: "else".to_string(),
                    condition: None,
                    body: Box::new(body),
                });
            }
            break;
        }

        let end = self.expect_bare_word("fi")?.1;
        Ok(Node::If {
            clauses,
            pos: (start, end),
        })
    }

    /// `name() compound` or `function name [()] compound`
    fn parse_function(&mut self) -> Result<Node> {
        let start = self.start_offset();
        if self.at_bare_word("function") {
            self.advance();
        }

        let name = match self.current().and_then(Token::bare_word) {
            Some(name) => name.to_string(),
            None => return Err(self.error("expected function name")),
        };
        self.advance();

        if matches!(self.current(), Some(Token::LeftParen)) {
            self.advance();
            if !matches!(self.current(), Some(Token::RightParen)) {
                return Err(self.error("expected ')' in function definition"));
            }
            self.advance();
        }
        self.skip_newlines();

        let body = match self.current() {
            Some(Token::LeftParen) => self.parse_compound("(", ")")?,
            _ if self.at_bare_word("{") => self.parse_compound("{", "}")?,
            _ => return Err(self.error("expected function body")),
        };

        Ok(Node::Function {
            name,
            body: Box::new(body),
            pos: (start, self.previous_end()),
        })
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Word(word) => format!("'{}'", word.text),
        Token::Newline => "newline".to_string(),
        Token::Semicolon => "';'".to_string(),
        Token::Pipe => "'|'".to_string(),
        Token::And => "'&&'".to_string(),
        Token::Or => "'||'".to_string(),
        Token::Background => "'&'".to_string(),
        Token::RedirectOut => "'>'".to_string(),
        Token::RedirectAppend => "'>>'".to_string(),
        Token::RedirectIn => "'<'".to_string(),
        Token::LeftParen => "'('".to_string(),
        Token::RightParen => "')'".to_string(),
    }
}

fn operator(op: &str, pos: Pos) -> Node {
    Node::Operator {
        op: op.to_string(),
        pos,
    }
}

fn reserved(word: &str, pos: Pos) -> Node {
    Node::ReservedWord {
        word: word.to_string(),
        pos,
    }
}

fn span_of(parts: &[Node]) -> Pos {
    let start = parts.first().map(|p| p.pos().0).unwrap_or(0);
    let end = parts.last().map(|p| p.pos().1).unwrap_or(start);
    (start, end)
}

fn is_name(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_assignment(word: &WordToken) -> bool {
    word.text
        .split_once('=')
        .is_some_and(|(name, _)| is_name(name))
}

fn word_parts(word: &WordToken) -> Result<Vec<Node>> {
    let mut parts = Vec::new();
    for parameter in &word.parameters {
        parts.push(Node::Parameter {
            value: parameter.value.clone(),
            pos: parameter.pos,
        });
    }
    for substitution in &word.substitutions {
        let mut nodes = Parser::with_offset(&substitution.inner, substitution.inner_offset)?.parse()?;
        let command = match nodes.len() {
            0 => return Err(Error::Parse("empty command substitution".to_string())),
            1 => nodes.remove(0),
            _ => {
                let mut list = Vec::new();
                for (i, node) in nodes.into_iter().enumerate() {
                    if i > 0 {
                        let at = node.pos().0;
                        list.push(operator("\n", (at, at)));
                    }
                    list.push(node);
                }
                Node::List {
                    pos: span_of(&list),
                    parts: list,
                }
            }
        };
        parts.push(Node::CommandSubstitution {
            command: Box::new(command),
            pos: substitution.pos,
        });
    }
    parts.sort_by_key(|p| p.pos().0);
    Ok(parts)
}

fn word_node(word: WordToken, pos: Pos) -> Result<Node> {
    let parts = word_parts(&word)?;
    Ok(Node::Word {
        word: word.text,
        parts,
        quoted: word.quoted,
        pos,
    })
}

fn assignment_node(word: WordToken, pos: Pos) -> Result<Node> {
    let parts = word_parts(&word)?;
    Ok(Node::Assignment {
        word: word.text,
        parts,
        pos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(input: &str) -> Node {
        let mut nodes = parse(input).unwrap();
        assert_eq!(nodes.len(), 1, "expected one node for {:?}", input);
        nodes.remove(0)
    }

    #[test]
    fn test_simple_command() {
        let node = one("echo hello world");
        let Node::Command { parts, pos } = &node else {
            panic!("expected command, got {}", node.kind());
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(*pos, (0, 16));
        assert_eq!(node.to_string(), "echo hello world");
    }

    #[test]
    fn test_assignment_prefix() {
        let node = one("a=$(echo x)");
        let Node::Command { parts, .. } = &node else {
            panic!("expected command");
        };
        let Node::Assignment { word, parts, .. } = &parts[0] else {
            panic!("expected assignment");
        };
        assert_eq!(word, "a=$(echo x)");
        assert_eq!(parts[0].kind(), "commandsubstitution");
        assert_eq!(parts[0].pos(), (2, 11));
    }

    #[test]
    fn test_assignment_only_before_words() {
        let node = one("echo a=b");
        let Node::Command { parts, .. } = &node else {
            panic!("expected command");
        };
        assert_eq!(parts[1].kind(), "word");
    }

    #[test]
    fn test_list_operators() {
        let node = one("a && b || c; d &");
        let Node::List { parts, .. } = &node else {
            panic!("expected list");
        };
        let ops: Vec<_> = parts
            .iter()
            .filter_map(|p| match p {
                Node::Operator { op, .. } => Some(op.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ops, vec!["&&", "||", ";", "&"]);
        assert_eq!(node.to_string(), "a && b || c; d &");
    }

    #[test]
    fn test_trailing_semicolon_dropped() {
        assert_eq!(one("echo a;").kind(), "command");
    }

    #[test]
    fn test_newlines_split_top_level() {
        let nodes = parse("echo a\n\necho b\n").unwrap();
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_pipeline() {
        let node = one("echo hello | cat");
        let Node::Pipeline { parts, .. } = &node else {
            panic!("expected pipeline");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].kind(), "pipe");
    }

    #[test]
    fn test_subshell_with_redirect() {
        let node = one("( echo \"text\" ) > /tmp/out");
        let Node::Compound {
            list, redirects, ..
        } = &node
        else {
            panic!("expected compound");
        };
        assert_eq!(list.len(), 3);
        assert_eq!(list[0], reserved("(", (0, 1)));
        assert_eq!(list[2].kind(), "reservedword");
        assert_eq!(redirects.len(), 1);
        let Node::Redirect { kind, output, .. } = &redirects[0] else {
            panic!("expected redirect");
        };
        assert_eq!(*kind, RedirectKind::Output);
        assert_eq!(output.to_string(), "/tmp/out");
        assert_eq!(node.to_string(), "( echo text ) > /tmp/out");
    }

    #[test]
    fn test_brace_group() {
        let node = one("{ echo a; echo b; }");
        let Node::Compound { list, .. } = &node else {
            panic!("expected compound");
        };
        assert_eq!(list[1].kind(), "list");
        assert_eq!(node.to_string(), "{ echo a; echo b; }");
    }

    #[test]
    fn test_for_loop() {
        let node = one("for i in a b c; do echo $i; done");
        let Node::For {
            name, items, body, ..
        } = &node
        else {
            panic!("expected for");
        };
        assert_eq!(name, "i");
        assert_eq!(items.len(), 3);
        assert_eq!(body.kind(), "command");
        assert_eq!(node.to_string(), "for i in a b c; do echo $i; done");
    }

    #[test]
    fn test_for_loop_multiline() {
        let node = one("for i in a b\ndo\n  echo $i\n  echo x\ndone");
        let Node::For { body, .. } = &node else {
            panic!("expected for");
        };
        assert_eq!(body.kind(), "list");
    }

    #[test]
    fn test_if_elif_else() {
        let node = one("if [ -f x ]; then echo a; elif true; then echo b; else echo c; fi");
        let Node::If { clauses, .. } = &node else {
            panic!("expected if");
        };
        assert_eq!(clauses.len(), 3);
        assert_eq!(clauses[0].condition.as_ref().unwrap().to_string(), "[ -f x ]");
        assert_eq!(clauses[1].keyword, "elif");
        assert!(clauses[2].condition.is_none());
    }

    #[test]
    fn test_function_definitions() {
        let node = one("greet() { echo hi $1; }");
        let Node::Function { name, body, .. } = &node else {
            panic!("expected function");
        };
        assert_eq!(name, "greet");
        assert_eq!(body.kind(), "compound");

        let node = one("function greet { echo hi; }");
        assert_eq!(node.kind(), "function");
    }

    #[test]
    fn test_nested_substitution_positions() {
        let node = one("echo $(echo $(echo hi))");
        let Node::Command { parts, .. } = &node else {
            panic!("expected command");
        };
        let Node::Word { parts, .. } = &parts[1] else {
            panic!("expected word");
        };
        let Node::CommandSubstitution { command, pos } = &parts[0] else {
            panic!("expected substitution");
        };
        assert_eq!(*pos, (5, 23));
        let Node::Command { parts: inner, .. } = command.as_ref() else {
            panic!("expected inner command");
        };
        assert_eq!(inner[1].pos(), (12, 22));
    }

    #[test]
    fn test_command_redirects() {
        let node = one("echo hi >> log");
        let Node::Command { parts, .. } = &node else {
            panic!("expected command");
        };
        assert_eq!(parts[2].kind(), "redirect");
        assert_eq!(node.to_string(), "echo hi >> log");
    }

    #[test]
    fn test_parse_errors_have_location() {
        let err = parse("echo a\nif true; then echo").unwrap_err();
        assert!(matches!(err, Error::ParseAt { .. }), "got {:?}", err);

        let err = parse("( echo a").unwrap_err();
        assert!(err.to_string().contains("expected ')'"));
    }

    #[test]
    fn test_unexpected_close_paren() {
        assert!(parse("echo a )").is_err());
    }
}
