//! Property-based tests for stepping and history
//!
//! Scripts are generated from a small grammar of statements the sandbox
//! models completely, so every run is deterministic.
//!
//! Run with: cargo test --test proptest_stepping

use judokit::{
    DisabledShell, Interpreter, LoadMode, NextFlags, RunFlags, ScriptedOracle, Session, parse,
};
use proptest::prelude::*;

fn word_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z]{1,6}").unwrap()
}

fn name_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-e]").unwrap()
}

// One statement the sandbox handles without asking the host
fn statement_strategy() -> impl Strategy<Value = String> {
    (name_strategy(), word_strategy(), word_strategy(), 0..14usize).prop_map(|(v, a, b, pick)| {
        match pick {
            0 => format!("echo {a} {b}"),
            1 => format!("{v}={a}"),
            2 => format!("echo ${v}"),
            3 => format!("cd /{a}"),
            4 => format!("echo {a} | cat"),
            5 => format!("for i in {a} {b}; do echo $i; done"),
            6 => format!("( {v}={a}; echo ${v} )"),
            7 => format!("echo $(echo {a})"),
            8 => format!("echo {a} > /tmp/{b}"),
            9 => format!("cat /tmp/{b}"),
            10 => format!("f() {{ echo {a}; }}; f {b}"),
            11 => format!("if [ -f /tmp/{a} ]; then echo y; else echo n; fi"),
            12 => format!("{v}=$(echo {a}); echo ${v}"),
            _ => format!("touch {a}; rm {a}"),
        }
    })
}

fn script_strategy() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(statement_strategy(), 1..8)
}

fn sandbox() -> Interpreter {
    Interpreter::builder()
        .oracle(Box::new(ScriptedOracle::new()))
        .host_shell(Box::new(DisabledShell))
        .build()
}

fn session() -> Session {
    Session::new(sandbox())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Stepping a node action by action ends in the same state as running it
    #[test]
    fn build_inch_matches_run(statements in script_strategy()) {
        let script = statements.join("\n");
        let nodes = parse(&script).unwrap();

        let mut whole = sandbox();
        let mut stepped = sandbox();
        for node in &nodes {
            whole.run(node).unwrap();

            stepped.build(node, false).unwrap();
            while stepped.inch().unwrap() {}
        }
        prop_assert_eq!(whole.state(), stepped.state());
        prop_assert_eq!(stepped.stack_len(), 0);
    }

    /// Undo restores the state captured right before the last step
    #[test]
    fn undo_inverts_last_run(statements in script_strategy()) {
        let mut s = session();
        let (last, prefix) = statements.split_last().unwrap();
        for statement in prefix {
            s.run(statement, RunFlags::default()).unwrap();
        }
        let before = s.interpreter().state().clone();

        s.run(last, RunFlags::default()).unwrap();
        s.undo();
        prop_assert_eq!(s.interpreter().state(), &before);
    }

    /// Undoing every step walks back to the initial state
    #[test]
    fn undo_all_returns_to_start(statements in script_strategy()) {
        let mut s = session();
        let initial = s.interpreter().state().clone();
        s.load(&statements.join("\n"), LoadMode::Replace);
        let steps = s.program().len();
        s.next(steps, NextFlags::default()).unwrap();
        for _ in 0..steps {
            s.undo();
        }
        prop_assert_eq!(s.interpreter().state(), &initial);
        prop_assert_eq!(s.cursor(), 0);
    }

    /// Scoped constructs never leak their scope
    #[test]
    fn scopes_always_balance(statements in script_strategy()) {
        let mut interp = sandbox();
        interp.run_script(&statements.join("; ")).unwrap();
        prop_assert_eq!(interp.state().scope_depth(), 0);
        prop_assert!(!interp.state().variables.contains_key("i"));
    }
}
