//! AST node types consumed by the interpreter
//!
//! The tree is deliberately flat and close to the shape of the source:
//! a command is a list of word, assignment and redirect parts; a list
//! interleaves commands with operator nodes; a subshell is a compound whose
//! list starts and ends with `(`/`)` reserved words.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Byte offsets `(start, end)` into the parsed source.
pub type Pos = (usize, usize);

/// Kind of a redirect node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectKind {
    /// `< file`
    #[serde(rename = "<")]
    Input,
    /// `> file`
    #[serde(rename = ">")]
    Output,
    /// `>> file`
    #[serde(rename = ">>")]
    Append,
}

impl RedirectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectKind::Input => "<",
            RedirectKind::Output => ">",
            RedirectKind::Append => ">>",
        }
    }
}

/// One `if`, `elif` or `else` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfClause {
    /// `if`, `elif` or `else`
    pub keyword: String,
    /// Condition, absent for `else`
    pub condition: Option<Box<Node>>,
    pub body: Box<Node>,
}

/// A node of the shell AST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    /// Simple command: words, assignments and redirects
    Command { parts: Vec<Node>, pos: Pos },

    /// A word with quotes removed. `parts` holds the parameter and command
    /// substitution nodes found in it.
    Word {
        word: String,
        #[serde(default)]
        parts: Vec<Node>,
        #[serde(default)]
        quoted: bool,
        pos: Pos,
    },

    /// `name=value`
    Assignment {
        word: String,
        #[serde(default)]
        parts: Vec<Node>,
        pos: Pos,
    },

    /// `$(command)` or the backquoted form
    #[serde(rename = "commandsubstitution")]
    CommandSubstitution { command: Box<Node>, pos: Pos },

    /// `$name` or `${...}`
    Parameter { value: String, pos: Pos },

    /// Commands joined by pipe nodes
    Pipeline { parts: Vec<Node>, pos: Pos },

    Pipe { pipe: String, pos: Pos },

    /// Commands interleaved with operator nodes
    List { parts: Vec<Node>, pos: Pos },

    /// `;`, newline, `&&`, `||` or `&`
    Operator { op: String, pos: Pos },

    /// Grouping `( ... )` or `{ ...; }` with optional redirects
    Compound {
        list: Vec<Node>,
        #[serde(default)]
        redirects: Vec<Node>,
        pos: Pos,
    },

    Redirect {
        #[serde(rename = "type")]
        kind: RedirectKind,
        output: Box<Node>,
        pos: Pos,
    },

    /// `for name in items; do body; done`
    For {
        name: String,
        items: Vec<Node>,
        body: Box<Node>,
        pos: Pos,
    },

    If { clauses: Vec<IfClause>, pos: Pos },

    /// Function definition; `body` is a compound node
    Function {
        name: String,
        body: Box<Node>,
        pos: Pos,
    },

    #[serde(rename = "reservedword")]
    ReservedWord { word: String, pos: Pos },
}

impl Node {
    /// Node kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Command { .. } => "command",
            Node::Word { .. } => "word",
            Node::Assignment { .. } => "assignment",
            Node::CommandSubstitution { .. } => "commandsubstitution",
            Node::Parameter { .. } => "parameter",
            Node::Pipeline { .. } => "pipeline",
            Node::Pipe { .. } => "pipe",
            Node::List { .. } => "list",
            Node::Operator { .. } => "operator",
            Node::Compound { .. } => "compound",
            Node::Redirect { .. } => "redirect",
            Node::For { .. } => "for",
            Node::If { .. } => "if",
            Node::Function { .. } => "function",
            Node::ReservedWord { .. } => "reservedword",
        }
    }

    /// Source span of the node.
    pub fn pos(&self) -> Pos {
        match self {
            Node::Command { pos, .. }
            | Node::Word { pos, .. }
            | Node::Assignment { pos, .. }
            | Node::CommandSubstitution { pos, .. }
            | Node::Parameter { pos, .. }
            | Node::Pipeline { pos, .. }
            | Node::Pipe { pos, .. }
            | Node::List { pos, .. }
            | Node::Operator { pos, .. }
            | Node::Compound { pos, .. }
            | Node::Redirect { pos, .. }
            | Node::For { pos, .. }
            | Node::If { pos, .. }
            | Node::Function { pos, .. }
            | Node::ReservedWord { pos, .. } => *pos,
        }
    }

    /// Create an unquoted word node with no parts.
    pub fn word(text: impl Into<String>, pos: Pos) -> Self {
        Node::Word {
            word: text.into(),
            parts: Vec::new(),
            quoted: false,
            pos,
        }
    }

    /// Indented tree dump, used by the `parse` driver command.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let (start, end) = self.pos();
        let label = match self {
            Node::Word { word, .. } | Node::Assignment { word, .. } => format!(" {:?}", word),
            Node::ReservedWord { word, .. } => format!(" {:?}", word),
            Node::Operator { op, .. } => format!(" {:?}", op),
            Node::Parameter { value, .. } => format!(" {:?}", value),
            Node::Pipe { pipe, .. } => format!(" {:?}", pipe),
            Node::Redirect { kind, .. } => format!(" {}", kind.as_str()),
            Node::For { name, .. } | Node::Function { name, .. } => format!(" {}", name),
            _ => String::new(),
        };
        out.push_str(&format!("{}{}{} [{}, {}]\n", indent, self.kind(), label, start, end));

        match self {
            Node::Command { parts, .. }
            | Node::Word { parts, .. }
            | Node::Assignment { parts, .. }
            | Node::Pipeline { parts, .. }
            | Node::List { parts, .. } => {
                for part in parts {
                    part.dump_into(out, depth + 1);
                }
            }
            Node::CommandSubstitution { command, .. } => command.dump_into(out, depth + 1),
            Node::Compound {
                list, redirects, ..
            } => {
                for part in list.iter().chain(redirects) {
                    part.dump_into(out, depth + 1);
                }
            }
            Node::Redirect { output, .. } => output.dump_into(out, depth + 1),
            Node::For { items, body, .. } => {
                for item in items {
                    item.dump_into(out, depth + 1);
                }
                body.dump_into(out, depth + 1);
            }
            Node::If { clauses, .. } => {
                for clause in clauses {
                    out.push_str(&format!("{}  {}\n", indent, clause.keyword));
                    if let Some(condition) = &clause.condition {
                        condition.dump_into(out, depth + 2);
                    }
                    clause.body.dump_into(out, depth + 2);
                }
            }
            Node::Function { body, .. } => body.dump_into(out, depth + 1),
            Node::Parameter { .. }
            | Node::Pipe { .. }
            | Node::Operator { .. }
            | Node::ReservedWord { .. } => {}
        }
    }
}

/// Render lexed word text back to shell syntax.
///
/// Plain text is emitted as is. Text with blanks or metacharacters is
/// wrapped in double quotes; `$(...)` regions are copied verbatim.
pub fn quote_word(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text.chars().any(|c| {
            c.is_whitespace() || matches!(c, ';' | '&' | '|' | '<' | '>' | '(' | ')' | '\'' | '"' | '#')
        });
    if !needs_quotes {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::from("\"");
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            if matches!(next, '$' | '`' | '\\' | '"') {
                out.push('\\');
            }
            out.push(next);
            i += 2;
            continue;
        }
        if c == '$' && chars.get(i + 1) == Some(&'(') {
            let end = matching_paren(&chars, i + 1).unwrap_or(chars.len() - 1);
            out.extend(&chars[i..=end]);
            i = end + 1;
            continue;
        }
        if c == '"' {
            out.push('\\');
        }
        out.push(c);
        i += 1;
    }
    out.push('"');
    out
}

/// Index of the `)` matching the `(` at `open`.
pub(crate) fn matching_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    let mut quote: Option<char> = None;
    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) => {
                if c == '\\' && q == '"' {
                    i += 1;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\\' => i += 1,
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Command { parts, .. } | Node::Pipeline { parts, .. } => {
                write_joined(f, parts, " ")
            }
            Node::Word { word, .. } => write!(f, "{}", quote_word(word)),
            Node::Assignment { word, .. } => match word.split_once('=') {
                Some((name, "")) => write!(f, "{}=", name),
                Some((name, value)) => write!(f, "{}={}", name, quote_word(value)),
                None => write!(f, "{}", word),
            },
            Node::CommandSubstitution { command, .. } => write!(f, "$({})", command),
            Node::Parameter { value, .. } => write!(f, "{}", value),
            Node::Pipe { pipe, .. } => write!(f, "{}", pipe),
            Node::List { parts, .. } => {
                let mut need_space = false;
                for part in parts {
                    match part {
                        Node::Operator { op, .. } => {
                            match op.as_str() {
                                ";" => write!(f, ";")?,
                                "\n" => writeln!(f)?,
                                other => write!(f, " {}", other)?,
                            }
                            need_space = op != "\n";
                        }
                        other => {
                            if need_space {
                                write!(f, " ")?;
                            }
                            write!(f, "{}", other)?;
                        }
                    }
                }
                Ok(())
            }
            Node::Operator { op, .. } => write!(f, "{}", op),
            Node::Compound {
                list, redirects, ..
            } => {
                for part in list {
                    match part {
                        Node::ReservedWord { word, .. } if word == "(" => write!(f, "( ")?,
                        Node::ReservedWord { word, .. } if word == ")" => write!(f, " )")?,
                        Node::ReservedWord { word, .. } if word == "{" => write!(f, "{{ ")?,
                        Node::ReservedWord { word, .. } if word == "}" => write!(f, "; }}")?,
                        other => write!(f, "{}", other)?,
                    }
                }
                for redirect in redirects {
                    write!(f, " {}", redirect)?;
                }
                Ok(())
            }
            Node::Redirect { kind, output, .. } => write!(f, "{} {}", kind.as_str(), output),
            Node::For {
                name, items, body, ..
            } => {
                write!(f, "for {} in ", name)?;
                write_joined(f, items, " ")?;
                write!(f, "; do {}; done", body)
            }
            Node::If { clauses, .. } => {
                for clause in clauses {
                    match &clause.condition {
                        Some(condition) => {
                            write!(f, "{} {}; then {}; ", clause.keyword, condition, clause.body)?
                        }
                        None => write!(f, "{} {}; ", clause.keyword, clause.body)?,
                    }
                }
                write!(f, "fi")
            }
            Node::Function { name, body, .. } => write!(f, "{}() {}", name, body),
            Node::ReservedWord { word, .. } => write!(f, "{}", word),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, nodes: &[Node], sep: &str) -> fmt::Result {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", node)?;
    }
    Ok(())
}
