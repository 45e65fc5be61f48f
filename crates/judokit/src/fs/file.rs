//! Files held by the virtual filesystem

use serde::{Deserialize, Serialize};

/// Permissions given to files created without explicit permissions.
pub const DEFAULT_PERMISSIONS: &str = "rw-rw-rw-";

/// A file in the virtual filesystem.
///
/// `contents` is `None` for placeholder entries, e.g. the file `chmod +x`
/// creates when its target does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Fully resolved path of the file
    pub name: String,
    /// File contents, absent for placeholders
    #[serde(default)]
    pub contents: Option<String>,
    /// Nine character `rwx` string, e.g. `rwxr--r--`
    #[serde(default = "default_permissions")]
    pub permissions: String,
}

fn default_permissions() -> String {
    DEFAULT_PERMISSIONS.to_string()
}

impl File {
    /// Create a file with contents and permissions.
    pub fn new(
        name: impl Into<String>,
        contents: impl Into<String>,
        permissions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            contents: Some(contents.into()),
            permissions: permissions.into(),
        }
    }

    /// Create a placeholder entry with no contents.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: None,
            permissions: default_permissions(),
        }
    }

    /// Contents as text, empty for placeholders.
    pub fn text(&self) -> &str {
        self.contents.as_deref().unwrap_or("")
    }

    /// Set the execute bit for user, group and other.
    pub fn add_execute(&mut self) {
        let mut chars: Vec<char> = self.permissions.chars().collect();
        chars.resize(9, '-');
        for index in [2, 5, 8] {
            chars[index] = 'x';
        }
        self.permissions = chars.into_iter().collect();
    }

    /// Apply an octal mode such as `755`.
    ///
    /// Returns false when `mode` is not a three digit octal number.
    pub fn set_octal_mode(&mut self, mode: &str) -> bool {
        let digits: Vec<u32> = match mode
            .chars()
            .map(|c| c.to_digit(8))
            .collect::<Option<Vec<_>>>()
        {
            Some(digits) if digits.len() == 3 => digits,
            _ => return false,
        };

        let mut permissions = String::with_capacity(9);
        for digit in digits {
            permissions.push(if digit & 4 != 0 { 'r' } else { '-' });
            permissions.push(if digit & 2 != 0 { 'w' } else { '-' });
            permissions.push(if digit & 1 != 0 { 'x' } else { '-' });
        }
        self.permissions = permissions;
        true
    }
}
