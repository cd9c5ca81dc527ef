// larder-mcp/src/tools/lookup.rs
// ============================================================================
// Module: Fuzzy Product Ranking
// Description: Approximate name matching for the product lookup tool.
// Purpose: Rank catalogue names with a strict pass and a wider fallback.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! Ranking runs two passes over the product name list. The strict pass
//! admits case-insensitive substring matches and names within edit
//! distance 2. When it yields nothing, the permissive pass widens the
//! radius and also admits any whole-token overlap. Results are ordered by
//! (substring match, edit distance, name) and capped at the requested
//! limit. Empty inputs produce empty rankings, never an error.

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Edit distance admitted by the strict pass.
const STRICT_DISTANCE: usize = 2;
/// Minimum edit distance admitted by the permissive pass.
const PERMISSIVE_DISTANCE_FLOOR: usize = 3;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One ranked match against the catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedMatch {
    /// Index of the name in the input slice.
    pub index: usize,
    /// Matched name.
    pub name: String,
    /// Edit distance between the query and the name (case-folded).
    pub distance: usize,
    /// Whether one string contains the other.
    pub substring: bool,
}

// ============================================================================
// SECTION: Ranking
// ============================================================================

/// Ranks catalogue names against a query, returning at most `limit` hits.
#[must_use]
pub fn rank_names(query: &str, names: &[String], limit: usize) -> Vec<RankedMatch> {
    let query = query.trim().to_lowercase();
    if query.is_empty() || names.is_empty() || limit == 0 {
        return Vec::new();
    }
    let strict = collect_pass(&query, names, Pass::Strict);
    let mut matches =
        if strict.is_empty() { collect_pass(&query, names, Pass::Permissive) } else { strict };
    matches.sort_by(|a, b| {
        b.substring
            .cmp(&a.substring)
            .then(a.distance.cmp(&b.distance))
            .then_with(|| a.name.cmp(&b.name))
    });
    matches.truncate(limit);
    matches
}

/// Matching pass selector.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// Substring or edit distance <= 2.
    Strict,
    /// Wider radius plus whole-token overlap.
    Permissive,
}

/// Collects all matches admitted by one pass.
fn collect_pass(query: &str, names: &[String], pass: Pass) -> Vec<RankedMatch> {
    let radius = match pass {
        Pass::Strict => STRICT_DISTANCE,
        Pass::Permissive => PERMISSIVE_DISTANCE_FLOOR.max(query.chars().count() / 3),
    };
    names
        .iter()
        .enumerate()
        .filter_map(|(index, name)| {
            let folded = name.trim().to_lowercase();
            if folded.is_empty() {
                return None;
            }
            let substring = folded.contains(query) || query.contains(&folded);
            let distance = levenshtein(query, &folded);
            let admitted = match pass {
                Pass::Strict => substring || distance <= radius,
                Pass::Permissive => {
                    substring || distance <= radius || token_overlap(query, &folded) > 0
                }
            };
            admitted.then(|| RankedMatch {
                index,
                name: name.clone(),
                distance,
                substring,
            })
        })
        .collect()
}

/// Counts whole tokens shared between query and name.
fn token_overlap(query: &str, name: &str) -> usize {
    query
        .split_whitespace()
        .filter(|token| name.split_whitespace().any(|other| other == *token))
        .count()
}

/// Computes the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, left) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, right) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(left != right);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions."
    )]

    use super::levenshtein;
    use super::rank_names;

    /// Builds an owned name list from literals.
    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("milk", "milk"), 0);
        assert_eq!(levenshtein("milk", "silk"), 1);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }

    #[test]
    fn strict_pass_prefers_substring_matches() {
        let catalogue = names(&["Oat Milk", "Whole Milk", "Butter"]);
        let ranked = rank_names("milk", &catalogue, 5);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|hit| hit.substring));
    }

    #[test]
    fn strict_pass_admits_close_typos() {
        let catalogue = names(&["Milk", "Butter"]);
        let ranked = rank_names("mikl", &catalogue, 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].name, "Milk");
    }

    #[test]
    fn fallback_widens_when_strict_finds_nothing() {
        let catalogue = names(&["Sourdough Bread Loaf", "Butter"]);
        // No substring and edit distance far beyond the strict radius, but
        // "loaf" is a shared whole token, so the permissive pass finds it.
        let ranked = rank_names("bred loaf", &catalogue, 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].name, "Sourdough Bread Loaf");
    }

    #[test]
    fn results_are_capped_at_the_limit() {
        let catalogue = names(&["Milk A", "Milk B", "Milk C", "Milk D", "Milk E", "Milk F"]);
        assert_eq!(rank_names("milk", &catalogue, 5).len(), 5);
    }

    #[test]
    fn empty_inputs_never_error() {
        assert!(rank_names("milk", &[], 5).is_empty());
        assert!(rank_names("   ", &names(&["Milk"]), 5).is_empty());
        assert!(rank_names("milk", &names(&["Milk"]), 0).is_empty());
    }

    #[test]
    fn ordering_is_deterministic() {
        let catalogue = names(&["Milk B", "Milk A"]);
        let ranked = rank_names("milk", &catalogue, 5);
        assert_eq!(ranked[0].name, "Milk A");
        assert_eq!(ranked[1].name, "Milk B");
    }
}
