//! Owned snapshot of the process environment.
//!
//! The bootstrap never mutates its own process environment. The variables
//! are captured once into an [`Environment`], every stage reads from that
//! value, and the final snapshot becomes the environment of the exec'd
//! command.

use std::collections::BTreeMap;

/// Sorted `KEY -> VALUE` snapshot of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Captures the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    #[must_use]
    pub fn capture() -> Self {
        let mut vars = BTreeMap::new();
        for (key, value) in std::env::vars_os() {
            match (key.into_string(), value.into_string()) {
                (Ok(k), Ok(v)) => {
                    let _ = vars.insert(k, v);
                }
                (k, _) => {
                    tracing::debug!(key = ?k, "skipping non UTF-8 environment variable");
                }
            }
        }
        Self { vars }
    }

    /// Builds a snapshot from explicit pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the value of `key`, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Iterates variables in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of variables in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the snapshot holds no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Returns a snapshot where `key` is set to `value`, replacing any
    /// existing value.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.vars.insert(key.into(), value.into());
        self
    }

    /// Returns a snapshot extended with `pairs` that are not already set.
    ///
    /// Existing variables always win.
    #[must_use]
    pub fn with_fallbacks<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in pairs {
            let _ = self.vars.entry(k.into()).or_insert_with(|| v.into());
        }
        self
    }
}

/// Removes every carriage return and line feed from `value`.
///
/// Interior spaces are preserved; the operation is idempotent.
#[must_use]
pub fn strip_line_breaks(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}
