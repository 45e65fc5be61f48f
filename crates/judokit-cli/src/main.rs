//! Judokit CLI - Step-through sandbox shell for untrusted scripts
//!
//! Usage:
//!   judo                           # Interactive driver (the Judo shell)
//!   judo script.sh                 # Load a script, then go interactive
//!   judo -c 'run echo hi;; screen' # Execute driver commands and exit
//!   judo --no-prompt -c '...'      # Never ask: conditions false, unknown commands skipped

mod commands;
mod prompt;

use anyhow::{Context, Result};
use clap::Parser;
use judokit::{DefaultOracle, HistoryMode, Interpreter, LoadMode, Outcome, Session};
use std::path::PathBuf;

use commands::{DEFAULT_CONFIG, Driver, expand_home};
use prompt::PromptOracle;

/// Judo - step through untrusted shell scripts in a sandbox
#[derive(Parser, Debug)]
#[command(name = "judo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Execute the given driver commands (separated by newlines or `;;`)
    #[arg(short = 'c')]
    command: Option<String>,

    /// Script file to load as the program
    #[arg()]
    script: Option<PathBuf>,

    /// Driver commands run at startup
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Do not snapshot state before each step
    #[arg(long)]
    no_history: bool,

    /// Answer every oracle question with the non-interactive default
    #[arg(long)]
    no_prompt: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut interpreter = Interpreter::new();
    if args.no_prompt {
        interpreter.set_oracle(Box::new(DefaultOracle));
    } else {
        interpreter.set_oracle(Box::new(PromptOracle::stdio()));
    }

    let mut driver = Driver::new(Session::new(interpreter), Some(expand_home(&args.config)));
    driver.import_config().context("Failed to import config")?;
    if args.no_history {
        driver.session_mut().history_mode(HistoryMode::Off);
    }

    if let Some(script) = &args.script {
        let outcome = driver.session_mut().load_file(script, LoadMode::Replace);
        report(&outcome);
        if outcome.status != 0 {
            std::process::exit(outcome.status);
        }
    }

    if let Some(command) = args.command {
        let mut status = 0;
        for line in command.lines().flat_map(|line| line.split(";;")) {
            let outcome = driver
                .execute(line)
                .with_context(|| format!("Failed to execute: {}", line.trim()))?;
            report(&outcome);
            status = outcome.status;
            if !driver.is_running() {
                break;
            }
        }
        std::process::exit(status);
    }

    repl(&mut driver)
}

fn report(outcome: &Outcome) {
    if !outcome.print_out || outcome.message.is_empty() {
        return;
    }
    if outcome.status == 0 {
        println!("{}", outcome.message);
    } else {
        eprintln!("{}", outcome.message);
    }
}

/// Execute one line, keeping the session alive on engine errors.
fn step(driver: &mut Driver, line: &str) {
    match driver.execute(line) {
        Ok(outcome) => report(&outcome),
        Err(e) => eprintln!("Error: {:#}", e),
    }
}

#[cfg(feature = "interactive")]
fn repl(driver: &mut Driver) -> Result<()> {
    use rustyline::Editor;
    use rustyline::error::ReadlineError;
    use rustyline::history::DefaultHistory;

    let mut rl: Editor<helper::JudoHelper, DefaultHistory> =
        Editor::new().context("Failed to start line editor")?;
    rl.set_helper(Some(helper::JudoHelper));

    println!("Welcome to the Judo Shell!");
    while driver.is_running() {
        match rl.readline("\n>> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);
                step(driver, trimmed);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}

#[cfg(not(feature = "interactive"))]
fn repl(driver: &mut Driver) -> Result<()> {
    use std::io::{BufRead, Write};

    println!("Welcome to the Judo Shell!");
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    while driver.is_running() {
        print!("\n>> ");
        std::io::stdout().flush().context("Failed to flush prompt")?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("Failed to read input")?;
        step(driver, line.trim());
    }
    Ok(())
}

#[cfg(feature = "interactive")]
mod helper {
    use rustyline::completion::{Completer, Pair};
    use rustyline::highlight::Highlighter;
    use rustyline::hint::Hinter;
    use rustyline::validate::Validator;
    use rustyline::{Context, Helper};

    use crate::commands::COMMANDS;

    /// Tab completion of driver command names.
    pub struct JudoHelper;

    impl Helper for JudoHelper {}

    impl Completer for JudoHelper {
        type Candidate = Pair;

        fn complete(
            &self,
            line: &str,
            pos: usize,
            _ctx: &Context<'_>,
        ) -> rustyline::Result<(usize, Vec<Pair>)> {
            let prefix = &line[..pos];
            // Only the command word completes
            if prefix.contains(char::is_whitespace) {
                return Ok((pos, Vec::new()));
            }
            let pairs = COMMANDS
                .iter()
                .filter(|name| name.starts_with(prefix))
                .map(|name| Pair {
                    display: name.to_string(),
                    replacement: name.to_string(),
                })
                .collect();
            Ok((0, pairs))
        }
    }

    impl Hinter for JudoHelper {
        type Hint = String;
    }

    impl Highlighter for JudoHelper {}

    impl Validator for JudoHelper {}
}
