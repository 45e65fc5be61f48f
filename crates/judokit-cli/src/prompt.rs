//! Oracle that asks the operator
//!
//! Each question is written to the output and answered with one line of
//! input. Unreadable input (EOF, closed terminal) falls back to the safe
//! answer: false, skip, nothing.

use std::io::{BufRead, Write};

use judokit::{CommandDecision, Oracle, TruthAnswer};

pub struct PromptOracle<R, W> {
    input: R,
    output: W,
}

impl PromptOracle<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptOracle<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        // A closed output only loses the question text.
        let _ = write!(self.output, "{}", question);
        let _ = self.output.flush();
        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(answer.trim_end_matches(['\n', '\r']).to_string()),
        }
    }

    /// Ask until the answer is one of `choices` (first letter, any case).
    fn choose(&mut self, question: &str, choices: &[char]) -> Option<char> {
        loop {
            let answer = self.ask(question)?;
            let choice = answer.trim().chars().next().map(|c| c.to_ascii_lowercase());
            if let Some(choice) = choice {
                if choices.contains(&choice) {
                    return Some(choice);
                }
            }
        }
    }

    /// Multi-line contents ended by a line holding a single `.`.
    fn contents(&mut self, question: &str) -> Option<String> {
        let first = self.ask(question)?;
        if first.is_empty() {
            return None;
        }
        let mut lines = Vec::new();
        let mut line = first;
        while line != "." {
            lines.push(line);
            line = self.ask("")?;
        }
        Some(lines.join("\n"))
    }
}

impl<R: BufRead, W: Write> Oracle for PromptOracle<R, W> {
    fn truth(&mut self, condition: &str) -> TruthAnswer {
        let question = format!(
            "Is the condition true? `{}`\n  t: true  f: false  e: run it in the sandbox\n> ",
            condition
        );
        match self.choose(&question, &['t', 'f', 'e']) {
            Some('t') => TruthAnswer::True,
            Some('e') => TruthAnswer::Execute,
            _ => TruthAnswer::False,
        }
    }

    fn unknown_command(&mut self, command: &str) -> CommandDecision {
        let question = format!(
            "Unknown command `{}`\n  s: skip  e: execute on the host  a: abort\n> ",
            command
        );
        match self.choose(&question, &['s', 'e', 'a']) {
            Some('e') => CommandDecision::Execute,
            Some('a') => CommandDecision::Abort,
            _ => CommandDecision::Skip,
        }
    }

    fn redirect_input(&mut self, path: &str) -> Option<String> {
        self.contents(&format!(
            "File {} is not in the sandbox. Enter its contents, end with a line holding `.` (empty for none)\n> ",
            path
        ))
    }

    fn fetch(&mut self, url: &str) -> Option<String> {
        self.contents(&format!(
            "Fetching {}. Enter the response body, end with a line holding `.` (empty for none)\n> ",
            url
        ))
    }

    fn loop_items(&mut self, item: &str) -> Option<String> {
        self.contents(&format!(
            "Loop item {} needs a command substitution. Enter its output, end with a line holding `.` (empty to drop it)\n> ",
            item
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn oracle(input: &str) -> PromptOracle<Cursor<Vec<u8>>, Vec<u8>> {
        PromptOracle::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_truth_answers() {
        assert_eq!(oracle("t\n").truth("[ -f x ]"), TruthAnswer::True);
        assert_eq!(oracle("False\n").truth("[ -f x ]"), TruthAnswer::False);
        assert_eq!(oracle("e\n").truth("[ -f x ]"), TruthAnswer::Execute);
    }

    #[test]
    fn test_reprompts_on_bad_answer() {
        let mut o = oracle("maybe\n\nt\n");
        assert_eq!(o.truth("c"), TruthAnswer::True);
        let asked = String::from_utf8(o.output).unwrap();
        assert_eq!(asked.matches("Is the condition true?").count(), 3);
    }

    #[test]
    fn test_eof_is_safe() {
        assert_eq!(oracle("").truth("c"), TruthAnswer::False);
        assert_eq!(oracle("").unknown_command("nmap"), CommandDecision::Skip);
        assert_eq!(oracle("").redirect_input("/etc/shadow"), None);
    }

    #[test]
    fn test_command_decisions() {
        assert_eq!(oracle("a\n").unknown_command("nmap"), CommandDecision::Abort);
        assert_eq!(oracle("E\n").unknown_command("nmap"), CommandDecision::Execute);
        assert_eq!(oracle("s\n").unknown_command("nmap"), CommandDecision::Skip);
    }

    #[test]
    fn test_multiline_contents() {
        let mut o = oracle("line one\nline two\n.\n");
        assert_eq!(
            o.redirect_input("/data"),
            Some("line one\nline two".to_string())
        );
        assert_eq!(oracle("\n").fetch("http://x"), None);
    }

    #[test]
    fn test_loop_items_prompt() {
        let mut o = oracle("a b\n.\n");
        assert_eq!(o.loop_items("$(ls)"), Some("a b".to_string()));
        let asked = String::from_utf8(o.output).unwrap();
        assert!(asked.contains("Loop item $(ls)"));
        assert_eq!(oracle("").loop_items("$(ls)"), None);
    }
}
