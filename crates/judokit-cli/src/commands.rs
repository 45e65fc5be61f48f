//! Driver command language
//!
//! A line is `command [-flags] arguments`. Flags come in one section right
//! after the command name (`-ie` and `-i -e` are the same). Arguments split
//! on whitespace with single quotes, double quotes and backslashes working
//! the way they do in a shell. Commands that take free text (`run`,
//! `build`, `shell`, `parse`, `stdin`, `stdout`, `truth`) see the raw rest
//! of the line after the flags instead.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use judokit::{FileSpec, HistoryMode, LoadMode, NextFlags, Outcome, RunFlags, Session};

/// Config file read at startup.
pub const DEFAULT_CONFIG: &str = "~/.judo_config";

/// Alias expansions allowed for one line.
const MAX_ALIAS_DEPTH: usize = 16;

/// Every command the driver understands.
pub const COMMANDS: &[&str] = &[
    "alias", "build", "dir", "env", "exit", "fs", "help", "history", "inch", "json", "list",
    "load", "next", "parse", "quit", "reset", "run", "save", "screen", "shell", "skip", "stack",
    "state", "stdin", "stdout", "tokenize", "truth", "undo", "var", "void",
];

/// One tokenized driver line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub name: String,
    pub flags: Vec<char>,
    pub args: Vec<String>,
    /// Raw text after the command name and flags
    pub rest: String,
    /// Raw text after the command name
    pub tail: String,
}

impl Line {
    pub fn has(&self, flag: char) -> bool {
        self.flags.contains(&flag)
    }

    /// Arguments joined back with single spaces.
    pub fn joined(&self) -> String {
        self.args.join(" ")
    }
}

/// Split `line` into a [`Line`]. Blank lines and `#` comments give `None`.
pub fn tokenize(line: &str) -> Option<Line> {
    let words = split_words(line);
    let (first, rest_words) = words.split_first()?;
    if first.text.starts_with('#') {
        return None;
    }

    let mut parsed = Line {
        name: first.text.clone(),
        tail: line[first.end..].to_string(),
        ..Line::default()
    };
    let mut rest_start = first.end;
    let mut in_flags = true;
    for word in rest_words {
        if in_flags && is_flag_word(&word.text) {
            parsed.flags.extend(word.text.chars().skip(1));
            rest_start = word.end;
            continue;
        }
        in_flags = false;
        parsed.args.push(word.text.clone());
    }
    parsed.rest = line[rest_start..].trim().to_string();
    Some(parsed)
}

fn is_flag_word(word: &str) -> bool {
    word.len() > 1
        && word.starts_with('-')
        && word.chars().skip(1).all(|c| c.is_ascii_alphabetic())
}

struct Word {
    text: String,
    end: usize,
}

fn split_words(line: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut chars = line.char_indices().peekable();
    while let Some(&(_, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut text = String::new();
        let mut end = line.len();
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() {
                end = i;
                break;
            }
            chars.next();
            match c {
                '\'' => {
                    for (_, q) in chars.by_ref() {
                        if q == '\'' {
                            break;
                        }
                        text.push(q);
                    }
                }
                '"' => {
                    while let Some((_, q)) = chars.next() {
                        match q {
                            '"' => break,
                            '\\' => match chars.peek() {
                                Some(&(_, next)) if matches!(next, '"' | '\\' | '$' | '`') => {
                                    text.push(next);
                                    chars.next();
                                }
                                _ => text.push('\\'),
                            },
                            _ => text.push(q),
                        }
                    }
                }
                '\\' => {
                    if let Some((_, next)) = chars.next() {
                        text.push(next);
                    }
                }
                _ => text.push(c),
            }
        }
        words.push(Word { text, end });
    }
    words
}

/// Expand a leading `~` against `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix('~') {
        if stripped.is_empty() || stripped.starts_with('/') {
            if let Some(home) = std::env::var_os("HOME") {
                let mut expanded = PathBuf::from(home);
                expanded.push(stripped.trim_start_matches('/'));
                return expanded;
            }
        }
    }
    PathBuf::from(path)
}

/// A session plus the command interpreter around it.
pub struct Driver {
    session: Session,
    config: Option<PathBuf>,
    running: bool,
}

impl Driver {
    pub fn new(session: Session, config: Option<PathBuf>) -> Self {
        Self {
            session,
            config,
            running: true,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// False once `exit` or `quit` ran.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run every line of the configured config file with history capture
    /// suspended. A missing file is not an error.
    pub fn import_config(&mut self) -> Result<()> {
        match self.config.clone() {
            Some(path) => self.import_config_from(&path),
            None => Ok(()),
        }
    }

    pub fn import_config_from(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no config file");
            return Ok(());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let maintain_history = self.session.maintain_history();
        self.session.history_mode(HistoryMode::Off);
        let mut result = Ok(());
        for line in text.lines() {
            if let Err(e) = self.execute(line) {
                result = Err(e).with_context(|| format!("config line failed: {}", line));
                break;
            }
        }
        // A `history on|off` line in the config wins over the saved flag.
        let history_changed = text
            .lines()
            .filter_map(tokenize)
            .any(|line| line.name == "history" && !line.args.is_empty());
        if !history_changed {
            self.session.history_mode(if maintain_history {
                HistoryMode::On
            } else {
                HistoryMode::Off
            });
        }
        tracing::info!(path = %path.display(), "config imported");
        result
    }

    /// Execute one driver line.
    pub fn execute(&mut self, text: &str) -> Result<Outcome> {
        self.execute_at_depth(text, 0)
    }

    fn execute_at_depth(&mut self, text: &str, depth: usize) -> Result<Outcome> {
        let Some(line) = tokenize(text) else {
            return Ok(Outcome::quiet());
        };

        if !COMMANDS.contains(&line.name.as_str()) {
            let Some(expansion) = self.session.resolve_alias(&line.name) else {
                return Ok(Outcome::usage(format!("Invalid command: {}", line.name)));
            };
            if depth >= MAX_ALIAS_DEPTH {
                return Ok(Outcome::usage(format!("Alias loop: {}", line.name)));
            }
            let expanded = format!("{}{}", expansion, line.tail);
            tracing::debug!(alias = %line.name, line = %expanded, "alias expanded");
            return self.execute_at_depth(&expanded, depth + 1);
        }

        self.dispatch(&line)
    }

    fn dispatch(&mut self, line: &Line) -> Result<Outcome> {
        let session = &mut self.session;
        let outcome = match line.name.as_str() {
            "load" => return Ok(self.load(line)),
            "next" => {
                let count = count_arg(line);
                session.next(
                    count,
                    NextFlags {
                        inch: line.has('i'),
                        execute: line.has('e'),
                        history: line.has('h'),
                        print: line.has('p'),
                    },
                )?
            }
            "undo" => {
                let exhausted = session.history().len() <= 1;
                let outcome = session.undo();
                if exhausted {
                    self.import_config()?;
                }
                return Ok(outcome);
            }
            "skip" => session.skip(count_arg(line)),
            "save" => session.save(&line.joined()),
            "inch" => session.inch(count_arg(line), line.has('e'))?,
            "run" => session.run(
                &line.rest,
                RunFlags {
                    inch: line.has('i'),
                    execute: line.has('e'),
                    history: line.has('h'),
                },
            )?,
            "build" => session.build(&line.rest, line.has('a'), line.has('f'))?,
            "stack" => session.stack(),
            "parse" => session.parse_dump(&line.rest, line.has('f')),
            "shell" => session.shell(&line.rest, !line.has('n')),
            "dir" => session.dir(non_empty(&line.joined())),
            "stdin" => session.stdin(non_empty(&line.rest)),
            "stdout" => session.stdout(non_empty(&line.rest)),
            "var" => match pairs(&line.args) {
                Some(pairs) => session.var(&pairs, line.has('p')),
                None => Outcome::usage("Invalid format for var command. Please use format var <name>:<value>"),
            },
            "fs" => {
                let specs: Option<Vec<FileSpec>> =
                    line.args.iter().map(|arg| FileSpec::parse(arg)).collect();
                match specs {
                    Some(specs) => session.fs(&specs, line.has('p')),
                    None => Outcome::usage(
                        "Invalid file formation. Please follow pattern: name:contents:permissions",
                    ),
                }
            }
            "state" => session.state(line.has('f')),
            "void" => Outcome::quiet(),
            "history" => return self.history(line),
            "exit" | "quit" => {
                self.running = false;
                Outcome::quiet()
            }
            "env" => return self.env(line),
            "json" => return self.json(line),
            "truth" => return Ok(self.truth(line)),
            "list" => match list_range(&line.joined()) {
                Some((before, after)) => session.list(before, after),
                None => Outcome::usage("Invalid arguments to list. Please use the format: list -X:+Y"),
            },
            "tokenize" => Outcome::ok(format!(
                "flags: {:?}\nargs: {:?}",
                line.flags, line.args
            )),
            "alias" => self.alias(line),
            "reset" => {
                let outcome = session.reset();
                self.import_config()?;
                outcome
            }
            "screen" => {
                let clear = line.has('c');
                let outcome = session.screen(clear);
                if clear && !line.has('p') {
                    Outcome::quiet()
                } else {
                    outcome
                }
            }
            "help" => Outcome::ok(format!("Commands: {}", COMMANDS.join(" "))),
            other => Outcome::usage(format!("Invalid command: {}", other)),
        };
        Ok(outcome)
    }

    fn load(&mut self, line: &Line) -> Outcome {
        let filename = line.joined();
        if filename.is_empty() {
            return Outcome::usage("Please specify a file to load");
        }
        let mode = if line.has('a') {
            LoadMode::Append
        } else if line.has('b') {
            LoadMode::Prepend
        } else {
            LoadMode::Replace
        };
        self.session.load_file(&expand_home(&filename), mode)
    }

    fn history(&mut self, line: &Line) -> Result<Outcome> {
        let mut messages = Vec::new();
        if line.has('p') || (line.flags.is_empty() && line.args.is_empty()) {
            messages.push(self.session.history_text().message);
        }
        if line.has('r') {
            messages.push(self.session.history_reset().message);
            self.import_config()?;
        }
        for arg in &line.args {
            let mode = match arg.as_str() {
                "on" => HistoryMode::On,
                "off" => HistoryMode::Off,
                "toggle" => HistoryMode::Toggle,
                other => {
                    return Ok(Outcome::usage(format!(
                        "Unknown history option: {}. Use on, off or toggle",
                        other
                    )));
                }
            };
            messages.push(self.session.history_mode(mode).message);
        }
        Ok(Outcome::ok(messages.join("\n")))
    }

    /// `env -e [file]` exports a config, `env -a file` imports one on top
    /// of the current state, plain `env file` starts over from `file`.
    fn env(&mut self, line: &Line) -> Result<Outcome> {
        let target = line.joined();
        if line.has('e') {
            let path = expand_home(if target.is_empty() {
                DEFAULT_CONFIG
            } else {
                &target
            });
            let mut config = self.session.export_config();
            config.push('\n');
            std::fs::write(&path, config)
                .with_context(|| format!("Failed to write config: {}", path.display()))?;
            return Ok(Outcome::ok(format!("Config written to {}", path.display())));
        }
        if target.is_empty() {
            return Ok(Outcome::usage("Please specify a config file"));
        }
        let path = expand_home(&target);
        if line.has('a') {
            self.import_config_from(&path)?;
            return Ok(Outcome::quiet());
        }
        self.session.reset();
        self.config = Some(path);
        self.import_config()?;
        Ok(Outcome::quiet())
    }

    fn json(&mut self, line: &Line) -> Result<Outcome> {
        let (Some(verb), Some(path)) = (line.args.first(), line.args.get(1)) else {
            return Ok(Outcome::usage("Usage: json export|import <file>"));
        };
        let path = expand_home(path);
        match verb.as_str() {
            "export" => {
                let json = self.session.export_json()?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write session: {}", path.display()))?;
                Ok(Outcome::ok(format!("Session written to {}", path.display())))
            }
            "import" => {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read session: {}", path.display()))?;
                Ok(self.session.import_json(&json)?)
            }
            other => Ok(Outcome::usage(format!(
                "Unknown json action: {}. Use export or import",
                other
            ))),
        }
    }

    fn truth(&mut self, line: &Line) -> Outcome {
        let mut messages = Vec::new();
        if line.has('p') {
            messages.push(self.session.truths_text().message);
        }
        if !line.rest.is_empty() {
            let Some((condition, value)) = line.rest.rsplit_once(':') else {
                return Outcome::usage(
                    "Invalid format for truth command. please use format truth <statement>:<bool>",
                );
            };
            let value = value.trim();
            if !matches!(
                value.to_ascii_lowercase().as_str(),
                "t" | "true" | "f" | "false"
            ) {
                return Outcome::usage(
                    "Invalid format for truth command. please use format truth <statement>:<bool>",
                );
            }
            self.session.set_truth(condition.trim(), value);
        }
        if messages.is_empty() {
            Outcome::quiet()
        } else {
            Outcome::ok(messages.join("\n"))
        }
    }

    fn alias(&mut self, line: &Line) -> Outcome {
        if line.has('p') {
            let names: Vec<&str> = line.args.iter().map(String::as_str).collect();
            return self.session.alias_lookup(&names);
        }
        if line.has('a') || line.args.is_empty() {
            return self.session.alias_table();
        }
        // `alias name text...`, or `name:text` as one word
        let (name, text) = match line.args.split_first() {
            Some((first, rest)) if rest.is_empty() => match first.split_once(':') {
                Some((name, text)) => (name.to_string(), text.to_string()),
                None => return Outcome::usage("Usage: alias <name> <text>"),
            },
            Some((first, rest)) => (first.clone(), rest.join(" ")),
            None => return Outcome::usage("Usage: alias <name> <text>"),
        };
        if COMMANDS.contains(&name.as_str()) {
            return Outcome::usage(format!("Cannot alias the built-in command {}", name));
        }
        self.session.alias(name, text)
    }
}

fn count_arg(line: &Line) -> usize {
    line.args
        .first()
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(1)
}

fn non_empty(text: &str) -> Option<&str> {
    if text.is_empty() { None } else { Some(text) }
}

/// `name:value` pairs, splitting on the first colon.
fn pairs(args: &[String]) -> Option<Vec<(String, String)>> {
    args.iter()
        .map(|arg| {
            arg.split_once(':')
                .map(|(name, value)| (name.to_string(), value.to_string()))
        })
        .collect()
}

/// `-X:+Y` (defaults to five either side).
fn list_range(text: &str) -> Option<(usize, usize)> {
    if text.is_empty() {
        return Some((5, 5));
    }
    let (before, after) = text.split_once(':')?;
    let before: i64 = before.trim().parse().ok()?;
    let after: i64 = after.trim().trim_start_matches('+').parse().ok()?;
    Some((before.unsigned_abs() as usize, after.unsigned_abs() as usize))
}
