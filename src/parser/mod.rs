pub mod listing;
pub mod specs;

/// Collapse whitespace runs and NBSPs into single spaces.
pub fn normalize_text(value: &str) -> String {
    value
        .replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
