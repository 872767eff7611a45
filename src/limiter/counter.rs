//! Counting namespaces that match a pattern

use super::pattern::NamePattern;

/// Count the names in a snapshot that match the pattern
pub fn count_matching<S: AsRef<str>>(pattern: &NamePattern, names: &[S]) -> usize {
    names
        .iter()
        .filter(|name| pattern.matches(name.as_ref()))
        .count()
}
