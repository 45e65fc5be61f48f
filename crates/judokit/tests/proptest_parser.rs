//! Property-based tests for the parser
//!
//! Uses proptest to generate random inputs and verify the parser and the
//! action compiler never panic.

use judokit::{DisabledShell, Interpreter, parse};
use proptest::prelude::*;

/// Strategies for generating shell-like input
mod strategies {
    use proptest::prelude::*;

    /// Generate arbitrary strings (may be invalid shell)
    pub fn arbitrary_string() -> impl Strategy<Value = String> {
        prop::string::string_regex(".{0,100}").unwrap()
    }

    /// Shell metacharacters only, to stress quoting and nesting
    pub fn punctuation() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-z $()`'\";|&<>{}#\\\\\n]{0,60}").unwrap()
    }

    /// Generate valid identifiers
    pub fn identifier() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z_][a-zA-Z0-9_]{0,20}").unwrap()
    }

    /// Generate simple words
    pub fn word() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9_./-]{1,30}").unwrap()
    }

    /// Nested command substitutions around a plain word
    pub fn nested_substitution() -> impl Strategy<Value = (usize, String)> {
        (
            1..6usize,
            prop::string::string_regex("[a-z][a-z0-9]{0,10}").unwrap(),
        )
    }
}

fn sandbox() -> Interpreter {
    Interpreter::builder()
        .host_shell(Box::new(DisabledShell))
        .build()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The parser returns Ok or Err for anything, never panics
    #[test]
    fn parser_never_panics(input in strategies::arbitrary_string()) {
        let _ = parse(&input);
    }

    #[test]
    fn parser_survives_metacharacters(input in strategies::punctuation()) {
        let _ = parse(&input);
    }

    /// Whatever parses can be compiled and drained without panicking
    #[test]
    fn parsed_input_runs_without_panic(input in strategies::punctuation()) {
        if let Ok(nodes) = parse(&input) {
            let mut interp = sandbox();
            for node in &nodes {
                let _ = interp.run(node);
            }
        }
    }

    /// Assignments parse into an assignment and bind the value
    #[test]
    fn assignment_binds_value(name in strategies::identifier(), value in strategies::word()) {
        let mut interp = sandbox();
        interp.run_script(&format!("{}={}", name, value)).unwrap();
        prop_assert_eq!(interp.state().variable(&name), Some(value.as_str()));
    }

    /// Nested substitutions unwind to the innermost word
    #[test]
    fn nested_substitutions_unwind((depth, word) in strategies::nested_substitution()) {
        let mut script = format!("echo {}", word);
        for _ in 0..depth {
            script = format!("echo $({})", script);
        }
        let mut interp = sandbox();
        interp.run_script(&script).unwrap();
        prop_assert_eq!(&interp.state().screen, &format!("{}\n", word));
        prop_assert_eq!(interp.state().scope_depth(), 0);
    }

    /// Rendering a parsed node and parsing it again gives the same text
    #[test]
    fn display_reparses(words in prop::collection::vec(strategies::word(), 1..5)) {
        let script = format!("echo {}", words.join(" "));
        let first = parse(&script).unwrap();
        let rendered = first[0].to_string();
        let second = parse(&rendered).unwrap();
        prop_assert_eq!(second[0].to_string(), rendered);
    }
}
