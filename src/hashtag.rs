//! Hashtag extraction from post content.

use regex::Regex;

static HASHTAG: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"#[^\s#]+").unwrap());

/// Extract hashtag names from post content.
///
/// A hashtag is `#` followed by one or more characters that are neither
/// whitespace nor `#`. Names are returned without the `#`, lower-cased, in
/// order of first appearance and without duplicates.
#[must_use]
pub fn extract_hashtags(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for m in HASHTAG.find_iter(content) {
        let name = m.as_str()[1..].to_lowercase();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
