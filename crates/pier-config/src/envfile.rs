//! The flat `KEY=VALUE` env file consumed by steps that run after handover
//! without inheriting the process environment (e.g. a supervisor).

use std::io::Write;
use std::path::Path;

use pier_common::constants::PERSIST_DENY_LIST;
use pier_common::env::{Environment, strip_line_breaks};

use crate::error::{ConfigError, Result};

/// Writes every variable of `env` except the deny-list to `path`, one
/// `KEY=VALUE` per line, sorted by key.
///
/// The file is replaced atomically. Returns the number of lines written.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created, written, or
/// renamed over `path`.
pub fn write_env_file(path: &Path, env: &Environment) -> Result<usize> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut body = String::new();
    let mut count = 0;
    for (key, value) in env.iter() {
        if PERSIST_DENY_LIST.contains(&key) {
            continue;
        }
        body.push_str(key);
        body.push('=');
        body.push_str(&strip_line_breaks(value));
        body.push('\n');
        count += 1;
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(body.as_bytes()).map_err(io_err)?;
    let _ = tmp.persist(path).map_err(|e| io_err(e.error))?;

    tracing::info!(path = %path.display(), count, "persisted environment");
    Ok(count)
}

/// Reads an env file previously written by [`write_env_file`].
///
/// Blank lines, `#` comments, and lines without `=` are skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(parse_env_lines(&content))
}

fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim_start)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim_end_matches('\r').to_string()))
        })
        .collect()
}
