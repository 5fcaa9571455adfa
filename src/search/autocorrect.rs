//! One-shot query correction for searches that return nothing

use once_cell::sync::Lazy;
use regex::Regex;

/// Common spellings mapped to the name GitHub indexes them under
const SYNONYMS: [(&str, &str); 5] = [
    ("next js", "nextjs"),
    ("tail wind", "tailwindcss"),
    ("type script", "typescript"),
    ("node js", "nodejs"),
    ("react js", "react"),
];

/// Minimum length of a compacted query worth retrying
const MIN_COMPACT_LEN: usize = 2;

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid regex"));

/// Suggests a corrected query, or `None` when there is nothing to retry
///
/// The synonym table is consulted first on the trimmed, lower-cased query.
/// Otherwise every run of characters that are neither letters nor digits is
/// removed. A suggestion equal to the original query is discarded.
pub fn correct_query(query: &str) -> Option<String> {
    let normalized = query.trim().to_lowercase();

    let candidate = SYNONYMS
        .iter()
        .find(|(from, _)| *from == normalized)
        .map(|(_, to)| to.to_string())
        .or_else(|| {
            let compact = NON_ALPHANUMERIC.replace_all(&normalized, "").into_owned();
            (compact.chars().count() >= MIN_COMPACT_LEN).then_some(compact)
        })?;

    (candidate != query).then_some(candidate)
}
