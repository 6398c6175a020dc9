//! Pluralization utilities.

/// Return "s" suffix for plural counts
///
/// # Examples
///
/// - `plural_s(0)` -> `"s"` (0 outputs)
/// - `plural_s(1)` -> `""` (1 output)
/// - `plural_s(5)` -> `"s"` (5 outputs)
#[inline]
pub fn plural_s(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Format count with noun, handling pluralization
///
/// - `plural_count(1, "dependent")` -> `"1 dependent"`
/// - `plural_count(3, "dependent")` -> `"3 dependents"`
#[inline]
pub fn plural_count(count: usize, noun: &str) -> String {
    format!("{count} {noun}{}", plural_s(count))
}
