use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

static FIX_PATTERN: OnceLock<Regex> = OnceLock::new();

fn fix_pattern() -> &'static Regex {
    FIX_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:fix(?:e[sd])?|close[sd]?|resolve[sd]?)\s+#(\d+)\b")
            .expect("issue reference pattern is valid")
    })
}

/// Issue numbers a commit message declares fixed, e.g. `Fixes #12` or `closes #7`.
pub fn parse_fixed_issue_numbers(message: &str) -> BTreeSet<u64> {
    fix_pattern()
        .captures_iter(message)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}
