//! Decision ports consulted while stepping
//!
//! The sandbox never guesses. When it meets a condition it cannot evaluate,
//! a command it does not model, or input it does not have, it asks an
//! [`Oracle`]. Real execution only happens through a [`HostShell`] and only
//! when the oracle answers [`CommandDecision::Execute`].

use std::collections::VecDeque;
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

/// Answer to "is this condition true?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruthAnswer {
    True,
    False,
    /// Run the condition inside the sandbox and use its output
    Execute,
}

/// Answer to "what should happen with this unknown command?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandDecision {
    /// Treat the command as a no-op
    Skip,
    /// Run it on the host through the escape hatch
    Execute,
    /// Stop with [`Error::CommandNotFound`](crate::Error::CommandNotFound)
    Abort,
}

/// External decision source for everything the sandbox cannot decide.
pub trait Oracle {
    /// Truth of an `if` condition that is not memoized yet.
    fn truth(&mut self, condition: &str) -> TruthAnswer;

    /// What to do with a command that is neither a function nor a builtin.
    fn unknown_command(&mut self, command: &str) -> CommandDecision;

    /// Contents for an input redirect whose file is not in the virtual
    /// filesystem. `None` leaves IN empty.
    fn redirect_input(&mut self, path: &str) -> Option<String>;

    /// Contents served for a URL requested by `wget`/`curl`.
    fn fetch(&mut self, url: &str) -> Option<String>;

    /// Values for a `for` list item holding a command substitution. Loop
    /// lists are fixed before the body runs, so the substitution cannot be
    /// stepped through. `None` drops the item.
    fn loop_items(&mut self, _item: &str) -> Option<String> {
        None
    }
}

/// Non-interactive policy: conditions are false, unknown commands are
/// skipped, and nothing is ever fetched.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOracle;

impl Oracle for DefaultOracle {
    fn truth(&mut self, _condition: &str) -> TruthAnswer {
        TruthAnswer::False
    }

    fn unknown_command(&mut self, _command: &str) -> CommandDecision {
        CommandDecision::Skip
    }

    fn redirect_input(&mut self, _path: &str) -> Option<String> {
        None
    }

    fn fetch(&mut self, _url: &str) -> Option<String> {
        None
    }
}

/// Oracle answering from pre-recorded queues, for tests and replays.
///
/// Each queue falls back to the [`DefaultOracle`] answer once drained.
/// Every question asked is recorded in [`ScriptedOracle::asked`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    truths: VecDeque<TruthAnswer>,
    commands: VecDeque<CommandDecision>,
    inputs: VecDeque<Option<String>>,
    fetches: VecDeque<Option<String>>,
    loop_items: VecDeque<Option<String>>,
    /// Questions in the order they were asked
    pub asked: Vec<String>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an answer for the next truth question.
    pub fn truth(mut self, answer: TruthAnswer) -> Self {
        self.truths.push_back(answer);
        self
    }

    /// Queue an answer for the next unknown command.
    pub fn command(mut self, decision: CommandDecision) -> Self {
        self.commands.push_back(decision);
        self
    }

    /// Queue contents for the next missing redirect input.
    pub fn input(mut self, contents: Option<&str>) -> Self {
        self.inputs.push_back(contents.map(str::to_string));
        self
    }

    /// Queue contents for the next fetched URL.
    pub fn fetch(mut self, contents: Option<&str>) -> Self {
        self.fetches.push_back(contents.map(str::to_string));
        self
    }

    /// Queue values for the next substituted loop item.
    pub fn loop_items(mut self, values: Option<&str>) -> Self {
        self.loop_items.push_back(values.map(str::to_string));
        self
    }
}

impl Oracle for ScriptedOracle {
    fn truth(&mut self, condition: &str) -> TruthAnswer {
        self.asked.push(format!("truth: {}", condition));
        self.truths.pop_front().unwrap_or(TruthAnswer::False)
    }

    fn unknown_command(&mut self, command: &str) -> CommandDecision {
        self.asked.push(format!("command: {}", command));
        self.commands.pop_front().unwrap_or(CommandDecision::Skip)
    }

    fn redirect_input(&mut self, path: &str) -> Option<String> {
        self.asked.push(format!("input: {}", path));
        self.inputs.pop_front().flatten()
    }

    fn fetch(&mut self, url: &str) -> Option<String> {
        self.asked.push(format!("fetch: {}", url));
        self.fetches.pop_front().flatten()
    }

    fn loop_items(&mut self, item: &str) -> Option<String> {
        self.asked.push(format!("loop: {}", item));
        self.loop_items.pop_front().flatten()
    }
}

/// Escape hatch to a real shell.
///
/// Failures are reported as text; they never abort the interpreter.
pub trait HostShell {
    /// Run `command`, feeding `stdin` when given, and return stdout
    /// followed by stderr.
    fn run(&mut self, command: &str, stdin: Option<&str>) -> String;
}

/// Runs commands with `sh -c` on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

impl HostShell for SystemShell {
    fn run(&mut self, command: &str, stdin: Option<&str>) -> String {
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => return format!("sh: failed to start: {}", e),
        };

        // Feed stdin from its own thread so a child that writes before it
        // finishes reading cannot block on a full stdout pipe.
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                let input = input.to_string();
                Some(thread::spawn(move || {
                    // A child that exits without reading closes the pipe;
                    // its output is still worth reporting.
                    let _ = pipe.write_all(input.as_bytes());
                }))
            }
            _ => None,
        };

        let output = child.wait_with_output();
        if let Some(writer) = writer {
            let _ = writer.join();
        }

        match output {
            Ok(output) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                text
            }
            Err(e) => format!("sh: {}", e),
        }
    }
}

/// Host shell that refuses to run anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledShell;

impl HostShell for DisabledShell {
    fn run(&mut self, command: &str, _stdin: Option<&str>) -> String {
        format!("host execution disabled: {}", command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_oracle_is_conservative() {
        let mut oracle = DefaultOracle;
        assert_eq!(oracle.truth("[ -f x ]"), TruthAnswer::False);
        assert_eq!(oracle.unknown_command("nc -l 4444"), CommandDecision::Skip);
        assert_eq!(oracle.redirect_input("~/in"), None);
        assert_eq!(oracle.fetch("http://example.com"), None);
        assert_eq!(oracle.loop_items("$(ls)"), None);
    }

    #[test]
    fn test_scripted_oracle_replays_and_records() {
        let mut oracle = ScriptedOracle::new()
            .truth(TruthAnswer::True)
            .command(CommandDecision::Abort)
            .fetch(Some("payload"));

        assert_eq!(Oracle::truth(&mut oracle, "a"), TruthAnswer::True);
        assert_eq!(Oracle::truth(&mut oracle, "b"), TruthAnswer::False);
        assert_eq!(oracle.unknown_command("x"), CommandDecision::Abort);
        assert_eq!(Oracle::fetch(&mut oracle, "http://h/p"), Some("payload".to_string()));
        assert_eq!(
            oracle.asked,
            vec!["truth: a", "truth: b", "command: x", "fetch: http://h/p"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_system_shell_streams_large_stdin() {
        let input = "x".repeat(1 << 20);
        let (tx, rx) = std::sync::mpsc::channel();
        let payload = input.clone();
        thread::spawn(move || {
            let _ = tx.send(SystemShell.run("cat", Some(&payload)));
        });
        let output = rx
            .recv_timeout(std::time::Duration::from_secs(30))
            .expect("cat with a large stdin should not hang");
        assert_eq!(output.len(), input.len());
        assert_eq!(output, input);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_shell_ignores_unread_stdin() {
        let output = SystemShell.run("echo done", Some(&"y".repeat(1 << 20)));
        assert_eq!(output, "done\n");
    }

    #[test]
    fn test_disabled_shell() {
        let mut shell = DisabledShell;
        assert!(shell.run("id", None).contains("disabled"));
    }
}
