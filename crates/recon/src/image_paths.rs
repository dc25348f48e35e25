//! Colon-delimited image path lists.
//!
//! Paths are relative to the configured image location. A literal `:` or
//! `\` inside a path is escaped with a backslash.

const DELIMITER: char = ':';
const ESCAPE: char = '\\';

/// Split an encoded list, honouring escapes. Empty segments are skipped.
pub fn split(encoded: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut chars = encoded.chars();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => current.push(ESCAPE),
            },
            DELIMITER => {
                if !current.is_empty() {
                    paths.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        paths.push(current);
    }
    paths
}

/// Encode a list of paths, escaping delimiters and backslashes.
pub fn join<S: AsRef<str>>(paths: &[S]) -> String {
    let mut encoded = String::new();
    for (i, path) in paths.iter().enumerate() {
        if i > 0 {
            encoded.push(DELIMITER);
        }
        for c in path.as_ref().chars() {
            if c == DELIMITER || c == ESCAPE {
                encoded.push(ESCAPE);
            }
            encoded.push(c);
        }
    }
    encoded
}

/// Set union of two encoded lists: `base` order first, then paths only
/// `incoming` has.
pub fn union(base: &str, incoming: &str) -> String {
    let mut seen: Vec<String> = Vec::new();
    for path in split(base).into_iter().chain(split(incoming)) {
        if !seen.contains(&path) {
            seen.push(path);
        }
    }
    join(&seen)
}
