//! In-memory virtual filesystem
//!
//! A flat map from fully resolved path to [`File`]. Directories are implied
//! by path prefixes; there is no directory entry type.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::file::{DEFAULT_PERMISSIONS, File};

/// Files keyed by resolved path.
///
/// Serializes as a list of files, the shape used by snapshot JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualFs {
    files: BTreeMap<String, File>,
}

impl VirtualFs {
    /// Create an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a file.
    pub fn get(&self, path: &str) -> Option<&File> {
        self.files.get(path)
    }

    /// Look up a file for mutation.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut File> {
        self.files.get_mut(path)
    }

    /// Whether a file exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Contents of the file at `path`, `None` if missing or a placeholder.
    pub fn text(&self, path: &str) -> Option<&str> {
        self.files.get(path).and_then(|f| f.contents.as_deref())
    }

    /// Insert a file, replacing any existing file with the same name.
    pub fn insert(&mut self, file: File) {
        self.files.insert(file.name.clone(), file);
    }

    /// Write contents to `path`, keeping permissions of an existing file.
    pub fn write(&mut self, path: &str, contents: impl Into<String>) {
        let contents = contents.into();
        match self.files.get_mut(path) {
            Some(file) => file.contents = Some(contents),
            None => self.insert(File::new(path, contents, DEFAULT_PERMISSIONS)),
        }
    }

    /// Append contents to `path`, creating the file if needed.
    pub fn append(&mut self, path: &str, contents: &str) {
        match self.files.get_mut(path) {
            Some(file) => {
                file.contents.get_or_insert_with(String::new).push_str(contents);
            }
            None => self.insert(File::new(path, contents, DEFAULT_PERMISSIONS)),
        }
    }

    /// Remove a file, returning it if it existed.
    pub fn remove(&mut self, path: &str) -> Option<File> {
        self.files.remove(path)
    }

    /// Copy `from` to `to`. A missing source produces an empty file.
    pub fn copy(&mut self, from: &str, to: &str) {
        let mut file = self
            .files
            .get(from)
            .cloned()
            .unwrap_or_else(|| File::new(from, "", DEFAULT_PERMISSIONS));
        file.name = to.to_string();
        self.insert(file);
    }

    /// Move `from` to `to`. A missing source produces an empty file.
    pub fn rename(&mut self, from: &str, to: &str) {
        let mut file = self
            .files
            .remove(from)
            .unwrap_or_else(|| File::new(from, "", DEFAULT_PERMISSIONS));
        file.name = to.to_string();
        self.insert(file);
    }

    /// Remove every file.
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the filesystem holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate files in path order.
    pub fn iter(&self) -> impl Iterator<Item = &File> {
        self.files.values()
    }
}

impl FromIterator<File> for VirtualFs {
    fn from_iter<I: IntoIterator<Item = File>>(iter: I) -> Self {
        let mut fs = Self::new();
        for file in iter {
            fs.insert(file);
        }
        fs
    }
}

impl Serialize for VirtualFs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.files.values())
    }
}

impl<'de> Deserialize<'de> for VirtualFs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let files = Vec::<File>::deserialize(deserializer)?;
        Ok(files.into_iter().collect())
    }
}
