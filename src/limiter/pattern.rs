//! Namespace name pattern
//!
//! Wraps a compiled regular expression. Matching is unanchored: a name
//! matches when any substring of it matches. Anchor the pattern with `^`/`$`
//! to match whole names.

use std::fmt;

use regex::Regex;

use crate::error::{Error, Result};

/// A compiled namespace name pattern, immutable once built
#[derive(Clone, Debug)]
pub struct NamePattern {
    regex: Regex,
}

impl NamePattern {
    /// Compile a pattern from its textual form
    pub fn compile(text: &str) -> Result<Self> {
        let regex = Regex::new(text).map_err(|source| Error::InvalidPattern {
            pattern: text.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    /// Check whether the namespace name matches
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// The source text the pattern was compiled from
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
