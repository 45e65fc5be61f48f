//! Download builtins - wget and curl
//!
//! Nothing leaves the sandbox. The URL is validated and the oracle supplies
//! whatever contents should stand in for the download.

use url::Url;

use super::{Builtin, Context};
use crate::error::Result;
use crate::fs::DEFAULT_PERMISSIONS;
use crate::interpreter::ExecResult;

/// First argument that is not an option.
fn url_argument(args: &[String]) -> Option<&String> {
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            // Options that take a value
            "-o" | "-O" | "-X" | "-d" | "--data" | "-H" | "--header" | "-P" => i += 2,
            _ if arg.starts_with('-') => i += 1,
            _ => return Some(arg),
        }
    }
    None
}

/// The curl builtin - print the contents of a URL.
///
/// Usage: curl [OPTIONS] URL
pub struct Curl;

impl Builtin for Curl {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let Some(raw) = url_argument(ctx.args) else {
            return Ok(ExecResult::err("curl: no URL specified", 2));
        };
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(_) => return Ok(ExecResult::err(format!("Invalid URL to curl: {}", raw), 3)),
        };

        tracing::info!(url = %url, "curl requested");
        match ctx.oracle.fetch(url.as_str()) {
            Some(contents) => Ok(ExecResult::ok(contents)),
            None => Ok(ExecResult::err(
                format!("curl: could not fetch {}", url),
                6,
            )),
        }
    }
}

/// The wget builtin - save the contents of a URL.
///
/// Usage: wget [OPTIONS] URL
///
/// The file is named after the last path segment of the URL, or
/// `index.html` when the path is empty, and stored in the working
/// directory.
pub struct Wget;

impl Builtin for Wget {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let Some(raw) = url_argument(ctx.args) else {
            return Ok(ExecResult::err("wget: missing URL", 1));
        };
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(_) => return Ok(ExecResult::err(format!("Invalid URL to wget: {}", raw), 1)),
        };

        tracing::info!(url = %url, "wget requested");
        let Some(contents) = ctx.oracle.fetch(url.as_str()) else {
            return Ok(ExecResult::err(
                format!("wget: unable to fetch {}", url),
                4,
            ));
        };

        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .unwrap_or("index.html")
            .to_string();
        ctx.state.write_file(&name, contents, DEFAULT_PERMISSIONS);
        Ok(ExecResult::ok(String::new()))
    }
}
