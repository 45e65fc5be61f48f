//! Simulated resources for the sandbox
//!
//! - [`File`]: a named blob with an `rwx` permission string
//! - [`VirtualFs`]: files keyed by fully resolved path
//! - [`IoSocket`]: the IN/OUT buffer pair commands read and write

mod file;
mod memory;
mod socket;

pub use file::{DEFAULT_PERMISSIONS, File};
pub use memory::VirtualFs;
pub use socket::IoSocket;

/// Resolve a path relative to the working directory.
///
/// Paths starting with `/` or `~` are absolute. A leading `./` is dropped,
/// `.` and `..` components are folded and a trailing slash is removed.
///
/// ```
/// use judokit::resolve_path;
///
/// assert_eq!(resolve_path("~", "notes.txt"), "~/notes.txt");
/// assert_eq!(resolve_path("~/a", "./b/../c/"), "~/a/c");
/// assert_eq!(resolve_path("~", "/etc/passwd"), "/etc/passwd");
/// ```
pub fn resolve_path(working_dir: &str, name: &str) -> String {
    let joined = if name.is_empty() {
        working_dir.to_string()
    } else if name.starts_with('/') || name.starts_with('~') {
        name.to_string()
    } else {
        format!("{}/{}", working_dir.trim_end_matches('/'), name)
    };
    normalize_path(&joined)
}

fn normalize_path(path: &str) -> String {
    let (root, rest) = if let Some(rest) = path.strip_prefix('/') {
        (Some("/"), rest)
    } else if path == "~" {
        (Some("~"), "")
    } else if let Some(rest) = path.strip_prefix("~/") {
        (Some("~"), rest)
    } else {
        (None, path)
    };

    let mut parts: Vec<&str> = Vec::new();
    for component in rest.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }

    match root {
        Some("/") => format!("/{}", parts.join("/")),
        Some(home) if parts.is_empty() => home.to_string(),
        Some(home) => format!("{}/{}", home, parts.join("/")),
        None => parts.join("/"),
    }
}
