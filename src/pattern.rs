//! Glob matching for loader selection, preloading and cache searches.
//!
//! The only wildcard is `*`, which matches any run of characters (including none).  Every other character matches
//! itself.  Matching ignores case: both sides are lowercased before comparison, the same normalization [Resource]
//! names go through.
//!
//! [Resource]: crate::Resource

/// Does `name` match `pattern`?
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let name = name.to_lowercase();
    match_lowered(pattern.as_bytes(), name.as_bytes())
}

/// Greedy matcher with single-point backtracking.
///
/// When a literal fails to match we go back to the most recent `*` and let it swallow one more byte.  Earlier stars
/// never need revisiting, so this stays linear-ish instead of exponential on patterns like `*a*a*a*b`.
fn match_lowered(pattern: &[u8], name: &[u8]) -> bool {
    let mut p = 0;
    let mut n = 0;
    // (pattern index just past the star, name index the star currently extends to)
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            p += 1;
            backtrack = Some((p, n));
        } else if p < pattern.len() && pattern[p] == name[n] {
            p += 1;
            n += 1;
        } else if let Some((star_p, star_n)) = backtrack {
            p = star_p;
            n = star_n + 1;
            backtrack = Some((star_p, n));
        } else {
            return false;
        }
    }

    // Trailing stars match the empty remainder.
    pattern[p..].iter().all(|&c| c == b'*')
}
