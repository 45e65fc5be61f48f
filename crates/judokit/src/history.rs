//! Undo history
//!
//! Each saved record holds a deep snapshot of the state taken just before a
//! mutating step. Undo pops the newest record and hands its snapshot back.

use serde::{Deserialize, Serialize};

use crate::interpreter::State;

/// One saved point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    /// Text of the step that followed the snapshot
    #[serde(default)]
    pub action: String,
    pub env: State,
    /// Program cursor when the snapshot was taken
    #[serde(skip)]
    pub cursor: usize,
}

impl Record {
    pub fn new(name: impl Into<String>, action: impl Into<String>, env: State, cursor: usize) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            env,
            cursor,
        }
    }

    /// Human readable dump used by the `history` command.
    pub fn text(&self) -> String {
        format!(
            "Name: {}\nAction: {}\n{}\n",
            self.name,
            self.action,
            self.env.text(false)
        )
    }
}

/// Ordered list of records. The first one is always the `init` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    records: Vec<Record>,
}

impl History {
    /// Start a history whose `init` record is `initial`.
    pub fn new(initial: &State) -> Self {
        Self {
            records: vec![Record::new("init", "", initial.clone(), 0)],
        }
    }

    /// Rebuild a history from imported records. An empty list gets a fresh
    /// `init` record.
    pub fn from_records(records: Vec<Record>) -> Self {
        if records.is_empty() {
            return Self::new(&State::new());
        }
        Self { records }
    }

    /// Snapshot `state` before a mutation. Without a name the record is
    /// named after its index.
    pub fn save(&mut self, name: Option<&str>, action: &str, state: &State, cursor: usize) {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| self.records.len().to_string());
        tracing::debug!(name = %name, records = self.records.len() + 1, "history saved");
        self.records
            .push(Record::new(name, action, state.clone(), cursor));
    }

    /// Pop the newest record. `None` when only `init` is left.
    pub fn undo(&mut self) -> Option<Record> {
        if self.records.len() <= 1 {
            return None;
        }
        let record = self.records.pop();
        if let Some(record) = &record {
            tracing::debug!(name = %record.name, "history undone");
        }
        record
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Listing of every record, as shown by the `history` command.
    pub fn text(&self) -> String {
        let mut output = String::from("\nHistory\n");
        for record in &self.records {
            output.push_str(&record.text());
            output.push_str("---------------------\n\n\n");
        }
        output
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_starts_with_init() {
        let history = History::new(&State::new());
        assert_eq!(history.len(), 1);
        assert_eq!(history.records()[0].name, "init");
    }

    #[test]
    fn test_save_names_by_index() {
        let mut history = History::new(&State::new());
        history.save(None, "echo a", &State::new(), 0);
        history.save(Some("checkpoint"), "User Save", &State::new(), 1);
        let names: Vec<&str> = history.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["init", "1", "checkpoint"]);
    }

    #[test]
    fn test_undo_returns_snapshot() {
        let mut history = History::new(&State::new());
        let mut before = State::new();
        before.set_variable("a", "1");
        history.save(None, "a=2", &before, 3);

        let record = history.undo().unwrap();
        assert_eq!(record.env.variable("a"), Some("1"));
        assert_eq!(record.cursor, 3);
        assert!(history.undo().is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut history = History::new(&State::new());
        let mut live = State::new();
        history.save(None, "x", &live, 0);
        live.set_variable("later", "1");
        assert!(history.records()[1].env.variables.is_empty());
    }

    #[test]
    fn test_json_is_record_list() {
        let mut history = History::new(&State::new());
        history.save(None, "echo", &State::new(), 0);
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[1]["name"], "1");
        assert_eq!(json[1]["action"], "echo");
    }
}
