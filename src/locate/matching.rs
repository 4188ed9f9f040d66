//! Text folding for name and anchor comparison.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::config::Anchor;

/// NFKC-normalize, lowercase and collapse whitespace.
pub fn fold(text: &str) -> String {
    text.nfkc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// NFKC-normalize, lowercase and drop all whitespace.
///
/// Extracted page text breaks words unpredictably, so anchors and names
/// are searched in this form.
pub fn compact(text: &str) -> String {
    text.nfkc()
        .flat_map(char::to_lowercase)
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Remove table-of-contents dot leaders and fold the rest.
pub fn strip_leaders(text: &str) -> String {
    static LEADERS: OnceLock<Regex> = OnceLock::new();
    let re = LEADERS.get_or_init(|| {
        Regex::new(r"(?:\s*[.…·_]){2,}\s*").expect("static leader pattern")
    });
    fold(&re.replace_all(text, " "))
}

/// Check whether page text carries an anchor.
pub fn anchor_matches(anchor: &Anchor, page_text: &str) -> bool {
    match anchor {
        Anchor::Literal(literal) => {
            let needle = compact(literal);
            !needle.is_empty() && compact(page_text).contains(&needle)
        }
        Anchor::Regex(pattern) => pattern.is_match(page_text),
    }
}

/// How well a candidate title matches a target name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NameMatch {
    /// One folded name contains the other
    Contains,
    /// Folded names are equal
    Exact,
}

/// Compare two already folded names.
pub fn match_names(target: &str, candidate: &str) -> Option<NameMatch> {
    if target.is_empty() || candidate.is_empty() {
        return None;
    }
    if target == candidate {
        Some(NameMatch::Exact)
    } else if candidate.contains(target) || target.contains(candidate) {
        Some(NameMatch::Contains)
    } else {
        None
    }
}
