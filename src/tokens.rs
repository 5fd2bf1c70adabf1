//! Corridor label tokens.
//!
//! Each classified entrance point becomes a token `G<corridor>`; a flight is
//! described by the ordered token sequence of its entrance segment. The
//! similarity stage only sees the set of distinct tokens.

use std::collections::BTreeSet;

use crate::corridors::CorridorId;

/// Prefix shared by all corridor tokens.
pub const TOKEN_PREFIX: &str = "G";

/// Token for a single corridor label.
pub fn token(corridor: CorridorId) -> String {
    format!("{TOKEN_PREFIX}{corridor}")
}

/// Map an ordered corridor sequence to its ordered token sequence.
pub fn tokenize(corridors: &[CorridorId]) -> Vec<String> {
    corridors.iter().map(|&c| token(c)).collect()
}

/// Distinct tokens of a sequence. Order and repetition are discarded.
pub fn token_set<S: AsRef<str>>(tokens: &[S]) -> BTreeSet<String> {
    tokens.iter().map(|t| t.as_ref().to_string()).collect()
}

/// Exact Jaccard similarity of two token collections, treated as sets.
/// Two empty sets are identical (1.0).
pub fn jaccard<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    let set_a = token_set(a);
    let set_b = token_set(b);
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 1.0;
    }
    set_a.intersection(&set_b).count() as f64 / union as f64
}
