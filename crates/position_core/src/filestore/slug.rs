//! Filesystem-safe directory names for items.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid slug regex"));

const FALLBACK_SLUG: &str = "item";

/// Lowercases `name` and collapses every run of non-alphanumerics to `-`.
///
/// The result never starts with `.` or `_`, so it cannot collide with the
/// index file, the lock file or temp files at the storage root.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let slug = NON_WORD_RUN.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_normalizes_case_and_separators() {
        assert_eq!(slugify("harper"), "harper");
        assert_eq!(slugify("My Car"), "my-car");
        assert_eq!(slugify("  ../etc/passwd "), "etc-passwd");
        assert_eq!(slugify("Zoë's bike #2"), "zoë-s-bike-2");
    }

    #[test]
    fn slugify_falls_back_for_symbol_only_names() {
        assert_eq!(slugify("!!!"), "item");
        assert_eq!(slugify("_items"), "items");
    }
}
