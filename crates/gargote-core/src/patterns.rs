//! Process-wide cache of compiled regular expressions.
//!
//! Patterns come from the loaded test and are matched against every response
//! of every iteration, so each distinct pattern is compiled once. The set of
//! patterns is bounded by the test definition.

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use regex::bytes::Regex as BytesRegex;
use regex::Regex;

type Cache<R> = RwLock<HashMap<String, R>>;

static TEXT: OnceLock<Cache<Regex>> = OnceLock::new();
static BYTES: OnceLock<Cache<BytesRegex>> = OnceLock::new();

/// Compiled `pattern` for matching text.
pub fn text(pattern: &str) -> Result<Regex, regex::Error> {
    cached(&TEXT, pattern, Regex::new)
}

/// Compiled `pattern` for matching raw bytes.
pub fn bytes(pattern: &str) -> Result<BytesRegex, regex::Error> {
    cached(&BYTES, pattern, BytesRegex::new)
}

// Malformed patterns are not cached; the error is rebuilt on every call.
fn cached<R: Clone>(
    cell: &OnceLock<Cache<R>>,
    pattern: &str,
    compile: fn(&str) -> Result<R, regex::Error>,
) -> Result<R, regex::Error> {
    let cache = cell.get_or_init(Default::default);

    let hit = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(pattern)
        .cloned();
    if let Some(re) = hit {
        return Ok(re);
    }

    let re = compile(pattern)?;
    let mut entries = cache.write().unwrap_or_else(PoisonError::into_inner);
    Ok(entries.entry(pattern.to_string()).or_insert(re).clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn is_cached<R>(cell: &OnceLock<Cache<R>>, pattern: &str) -> bool {
        cell.get()
            .map(|c| c.read().unwrap().contains_key(pattern))
            .unwrap_or(false)
    }

    #[test]
    fn text_pattern_is_compiled_once() {
        let pattern = r"^order-[0-9]+$";
        let first = text(pattern).unwrap();
        assert!(is_cached(&TEXT, pattern));

        let second = text(pattern).unwrap();
        assert_eq!(first.as_str(), second.as_str());
        assert!(second.is_match("order-42"));
        assert!(!second.is_match("order-"));
    }

    #[test]
    fn bytes_pattern_is_compiled_once() {
        let pattern = r#""token":\s*"[a-f0-9]+""#;
        let first = bytes(pattern).unwrap();
        assert!(is_cached(&BYTES, pattern));

        let second = bytes(pattern).unwrap();
        assert_eq!(first.as_str(), second.as_str());
        assert!(second.is_match(br#"{"token": "beef01"}"#));
    }

    #[test]
    fn text_and_bytes_caches_are_separate() {
        let pattern = r"separate-caches-\d";
        bytes(pattern).unwrap();
        assert!(is_cached(&BYTES, pattern));
        assert!(!is_cached(&TEXT, pattern));
    }

    #[test]
    fn malformed_pattern_is_an_error_every_time() {
        let pattern = "([unclosed";
        assert!(text(pattern).is_err());
        assert!(text(pattern).is_err());
        assert!(bytes(pattern).is_err());
        assert!(!is_cached(&TEXT, pattern));
        assert!(!is_cached(&BYTES, pattern));
    }
}
