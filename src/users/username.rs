//! Username derivation: normalize the person's names, join them with a dot
//! and pick the smallest free numeric suffix among what the store already
//! holds.

use std::collections::HashSet;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Lowercases, strips diacritics down to base Latin letters and drops
/// everything outside `[a-z0-9]`.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Builds the base candidate `first.last` from the raw name fields.
///
/// Returns `None` when both names normalize to nothing (the caller rejects
/// the request). When exactly one side is empty, that side and the separator
/// are omitted, so the candidate is just the non-empty part; it still goes
/// through the normal uniqueness check.
pub fn base_candidate(first_name: &str, last_name: &str) -> Option<String> {
    let first = normalize_name(first_name);
    let last = normalize_name(last_name);
    match (first.is_empty(), last.is_empty()) {
        (true, true) => None,
        (false, true) => Some(first),
        (true, false) => Some(last),
        (false, false) => Some(format!("{first}.{last}")),
    }
}

/// Picks the smallest non-negative suffix not present in `taken`: the bare
/// base stands for suffix 0, `base1`, `base2`, ... for the rest. Entries
/// that merely share the prefix without an all-digit remainder are ignored.
pub fn pick_available(base: &str, taken: &[String]) -> String {
    let mut used: HashSet<u64> = HashSet::new();
    for name in taken {
        if name == base {
            used.insert(0);
        } else if let Some(rest) = name.strip_prefix(base) {
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                // Leading zeros ("base01") mark the parsed value as taken;
                // that only ever skips a candidate, never collides.
                if let Ok(n) = rest.parse::<u64>() {
                    if n > 0 {
                        used.insert(n);
                    }
                }
            }
        }
    }

    let mut n: u64 = 0;
    while used.contains(&n) {
        n += 1;
    }
    if n == 0 {
        base.to_string()
    } else {
        format!("{base}{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_strips_accents_and_case() {
        assert_eq!(normalize_name("María"), "maria");
        assert_eq!(normalize_name("  García "), "garcia");
        assert_eq!(normalize_name("Núñez"), "nunez");
    }

    #[test]
    fn normalize_drops_non_alphanumerics_but_keeps_digits() {
        assert_eq!(normalize_name("O'Brien"), "obrien");
        assert_eq!(normalize_name("Jean-Luc"), "jeanluc");
        assert_eq!(normalize_name("Agent 47"), "agent47");
        assert_eq!(normalize_name("!!!"), "");
    }

    #[test]
    fn base_candidate_joins_with_dot() {
        assert_eq!(
            base_candidate("María", "García"),
            Some("maria.garcia".to_string())
        );
    }

    #[test]
    fn base_candidate_omits_empty_side() {
        assert_eq!(base_candidate("María", "!!!"), Some("maria".to_string()));
        assert_eq!(base_candidate("###", "García"), Some("garcia".to_string()));
    }

    #[test]
    fn base_candidate_rejects_both_sides_empty() {
        assert_eq!(base_candidate("  ", "!!!"), None);
        assert_eq!(base_candidate("", ""), None);
    }

    #[test]
    fn pick_returns_bare_base_when_free() {
        assert_eq!(pick_available("maria.garcia", &[]), "maria.garcia");
    }

    #[test]
    fn pick_counts_up_from_the_base() {
        assert_eq!(
            pick_available("maria.garcia", &taken(&["maria.garcia"])),
            "maria.garcia1"
        );
        assert_eq!(
            pick_available("maria.garcia", &taken(&["maria.garcia", "maria.garcia1"])),
            "maria.garcia2"
        );
    }

    #[test]
    fn pick_fills_the_smallest_free_slot() {
        assert_eq!(
            pick_available("maria.garcia", &taken(&["maria.garcia", "maria.garcia2"])),
            "maria.garcia1"
        );
        assert_eq!(
            pick_available("maria.garcia", &taken(&["maria.garcia1"])),
            "maria.garcia"
        );
    }

    #[test]
    fn pick_ignores_non_numeric_suffixes() {
        assert_eq!(
            pick_available(
                "maria.garcia",
                &taken(&["maria.garcian", "maria.garcia.old", "maria.garcia1x"])
            ),
            "maria.garcia"
        );
    }

    #[test]
    fn pick_treats_leading_zero_suffix_as_taken() {
        assert_eq!(
            pick_available("maria.garcia", &taken(&["maria.garcia", "maria.garcia01"])),
            "maria.garcia2"
        );
    }
}
