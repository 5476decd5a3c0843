//! Issue-key extraction.
//!
//! An issue key is a project prefix followed by a number, e.g. `BILL-42`.

use std::sync::LazyLock;

use regex::Regex;

/// Pattern of a single issue key.
pub const ISSUE_KEY_PATTERN: &str = r"[A-Z][A-Z0-9_]{1,9}-\d+";

static ISSUE_KEY_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b{}\b", ISSUE_KEY_PATTERN)).expect("issue key pattern is valid")
});

static ISSUE_KEY_EXACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{}$", ISSUE_KEY_PATTERN)).expect("issue key pattern is valid")
});

/// Extracts every issue key mentioned in `text`, sorted and de-duplicated.
///
/// # Example
///
/// ```
/// use facade_core::issue_keys;
///
/// let keys = issue_keys("BILL-12: fix rounding (see also OPS-3, BILL-12)");
/// assert_eq!(keys, vec!["BILL-12", "OPS-3"]);
/// ```
pub fn issue_keys(text: &str) -> Vec<String> {
    let mut keys: Vec<String> = ISSUE_KEY_IN_TEXT
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Returns true if `candidate` is exactly one issue key.
pub fn is_issue_key(candidate: &str) -> bool {
    ISSUE_KEY_EXACT.is_match(candidate)
}
