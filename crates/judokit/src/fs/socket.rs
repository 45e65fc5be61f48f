//! IO socket: the IN/OUT buffer pair

use serde::{Deserialize, Serialize};

/// Standard input/output buffers of the sandbox.
///
/// Commands append to `OUT` and consume `IN`. A pipe hop is modelled by
/// [`IoSocket::transfer`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoSocket {
    #[serde(rename = "id_num", default)]
    pub id: u32,
    #[serde(rename = "IN", default)]
    pub input: String,
    #[serde(rename = "OUT", default)]
    pub output: String,
}

impl IoSocket {
    /// Create an empty socket.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Append text to OUT.
    pub fn write(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Take IN, leaving it empty.
    pub fn read(&mut self) -> String {
        std::mem::take(&mut self.input)
    }

    /// IN without consuming it.
    pub fn peek(&self) -> &str {
        &self.input
    }

    /// Move OUT into IN and clear OUT.
    pub fn transfer(&mut self) {
        self.input = std::mem::take(&mut self.output);
    }
}
