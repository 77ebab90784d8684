//! `Mountfile` line grammar.
//!
//! ```text
//! line    = token ws* ":" ws* token ws* comment?
//! token   = "/"? path-char+ "/"?
//! comment = "#" any*
//! ```
//!
//! Path characters are letters, digits, `_`, `.`, `-`, `/`, and interior
//! spaces. A token must end in a letter, digit, `_`, `.` or `-` once its
//! surrounding whitespace and one leading and trailing slash are removed.

use nom::{
    IResult, Parser,
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::{eof, opt, rest},
    sequence::preceded,
};
use pier_common::types::{MountBinding, MountPlan};

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn is_path_char(c: char) -> bool {
    is_word_char(c) || matches!(c, '/' | ' ')
}

fn path_token(input: &str) -> IResult<&str, &str> {
    take_while1(is_path_char).parse(input)
}

fn binding(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, remote) = path_token(input)?;
    let (input, _) = (space0, char(':'), space0).parse(input)?;
    let (input, local) = path_token(input)?;
    let (input, _) = (space0, opt(preceded(char('#'), rest)), eof).parse(input)?;
    Ok((input, (remote, local)))
}

fn normalize(token: &str) -> Option<&str> {
    let token = token.trim();
    let token = token.strip_prefix('/').unwrap_or(token);
    let token = token.strip_suffix('/').unwrap_or(token);
    let token = token.trim();
    token
        .chars()
        .next_back()
        .filter(|c| is_word_char(*c))
        .map(|_| token)
}

/// Parses one manifest line.
///
/// Returns `None` for blank lines, comments, and anything that does not
/// match the grammar; callers skip those lines silently.
#[must_use]
pub fn parse_line(raw: &str) -> Option<MountBinding> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (_, (remote, local)) = binding(line).ok()?;
    let remote = normalize(remote)?;
    let local = normalize(local)?;
    Some(MountBinding::new(remote, local))
}

/// Parses a whole manifest, keeping matched lines in order.
#[must_use]
pub fn parse_manifest(content: &str) -> MountPlan {
    content
        .lines()
        .filter_map(|line| {
            let parsed = parse_line(line);
            if parsed.is_none() && !line.trim().is_empty() && !line.trim_start().starts_with('#') {
                tracing::debug!(line, "skipping unrecognized Mountfile line");
            }
            parsed
        })
        .collect()
}
